//! Retrying HTTP client with per-attempt session rotation.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, RANGE, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use super::RequestContext;

/// Pool of browser identities used when no User-Agent is pinned. A new one is
/// drawn per attempt so retried calls do not present the same fingerprint.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36 Edg/136.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0",
];

/// Errors that can occur while talking to an upstream host.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("invalid header in request context: {0}")]
    InvalidHeader(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl NetError {
    /// The HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How network sessions relate across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Build a new `reqwest::Client` (fresh cookie jar, new random identity)
    /// for every attempt. The default; favors scraping resilience.
    #[default]
    FreshPerCall,
    /// Reuse one prebuilt client for all calls. The shared client carries no
    /// extra synchronization; callers must not mutate shared context
    /// concurrently from multiple workers.
    Shared,
}

/// Client policy: retry bound, timeout, session mode, optional proxy.
#[derive(Debug, Clone)]
pub struct HttpPolicy {
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub session_mode: SessionMode,
    pub proxy: Option<String>,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout: Duration::from_secs(15),
            session_mode: SessionMode::FreshPerCall,
            proxy: None,
        }
    }
}

/// HTTP client wrapper enforcing the engine's retry and session policy.
///
/// Retries are local to one call: a transient failure (connect error,
/// timeout, 5xx, 429) is retried up to `max_retries` times, each attempt with
/// a fresh session and a newly drawn User-Agent unless the policy says to
/// reuse one shared session. Non-transient HTTP errors fail fast.
#[derive(Clone)]
pub struct HttpClient {
    policy: HttpPolicy,
    shared: Option<reqwest::Client>,
}

impl HttpClient {
    pub fn new(policy: HttpPolicy) -> Result<Self, NetError> {
        let shared = match policy.session_mode {
            SessionMode::Shared => Some(build_client(&policy, None)?),
            SessionMode::FreshPerCall => None,
        };
        Ok(Self { policy, shared })
    }

    pub fn policy(&self) -> &HttpPolicy {
        &self.policy
    }

    /// GET returning a success response; transient failures retried.
    pub async fn get(&self, url: &str, ctx: &RequestContext) -> Result<Response, NetError> {
        self.request(Method::GET, url, ctx, None).await
    }

    /// HEAD returning whatever final status the server produced (no error on
    /// non-success; link testing wants to see the status).
    pub async fn head(&self, url: &str, ctx: &RequestContext) -> Result<Response, NetError> {
        self.request_raw(Method::HEAD, url, ctx, None).await
    }

    /// GET with a `Range` header, returning the raw response.
    pub async fn get_range(
        &self,
        url: &str,
        ctx: &RequestContext,
        range: &str,
    ) -> Result<Response, NetError> {
        self.request_raw(Method::GET, url, ctx, Some(range)).await
    }

    /// Issue a request, retrying transient failures, and require a success
    /// (or 206) status.
    async fn request(
        &self,
        method: Method,
        url: &str,
        ctx: &RequestContext,
        range: Option<&str>,
    ) -> Result<Response, NetError> {
        let resp = self.request_raw(method, url, ctx, range).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(NetError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }

    /// Issue a request, retrying transient failures, and hand back the final
    /// response regardless of status. 5xx and 429 responses count as
    /// transient and are retried; any other status is final.
    async fn request_raw(
        &self,
        method: Method,
        url: &str,
        ctx: &RequestContext,
        range: Option<&str>,
    ) -> Result<Response, NetError> {
        let attempts = self.policy.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let client = match &self.shared {
                Some(shared) => shared.clone(),
                None => build_client(&self.policy, ctx.user_agent())?,
            };

            let mut req = client.request(method.clone(), url);
            req = req.headers(context_headers(ctx)?);
            if let Some(range) = range {
                req = req.header(RANGE, range);
            }
            if let Some(timeout) = ctx.timeout() {
                req = req.timeout(timeout);
            }

            match req.send().await {
                Ok(resp) if is_transient_status(resp.status()) => {
                    last_error = format!("HTTP {}", resp.status());
                    debug!(url, attempt, status = %resp.status(), "transient status, retrying");
                }
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                    last_error = e.to_string();
                    debug!(url, attempt, error = %e, "transient error, retrying");
                }
                Err(e) => {
                    warn!(url, error = %e, "request failed");
                    return Err(NetError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
            }
        }

        Err(NetError::Exhausted {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn build_client(policy: &HttpPolicy, user_agent: Option<&str>) -> Result<reqwest::Client, NetError> {
    let ua = match user_agent {
        Some(ua) => ua.to_string(),
        None => {
            let mut rng = rand::thread_rng();
            USER_AGENTS
                .choose(&mut rng)
                .copied()
                .unwrap_or(USER_AGENTS[0])
                .to_string()
        }
    };

    let mut builder = reqwest::Client::builder()
        .user_agent(ua)
        .timeout(policy.request_timeout)
        .cookie_store(true);

    if let Some(proxy) = &policy.proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| NetError::ClientBuild(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| NetError::ClientBuild(e.to_string()))
}

fn context_headers(ctx: &RequestContext) -> Result<HeaderMap, NetError> {
    let mut headers = HeaderMap::new();
    for (name, value) in ctx.headers() {
        let name: HeaderName = name
            .parse()
            .map_err(|_| NetError::InvalidHeader(name.clone()))?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| NetError::InvalidHeader(value.clone()))?;
        headers.insert(name, value);
    }
    if let Some(cookie) = ctx.cookie() {
        let value: HeaderValue = cookie
            .parse()
            .map_err(|_| NetError::InvalidHeader("cookie".to_string()))?;
        headers.insert(COOKIE, value);
    }
    if let Some(ua) = ctx.user_agent() {
        let value: HeaderValue = ua
            .parse()
            .map_err(|_| NetError::InvalidHeader("user-agent".to_string()))?;
        headers.insert(USER_AGENT, value);
    }
    Ok(headers)
}
