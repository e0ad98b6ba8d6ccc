//! Immutable per-call request context.

use std::collections::BTreeMap;
use std::time::Duration;

/// Everything a single upstream call needs to know about how to present
/// itself: extra headers, cookies, an optional User-Agent pin and an optional
/// timeout override.
///
/// A context is constructed once, before a call chain starts, and passed down
/// by reference. It is never mutated after creation; a caller that wants a
/// variation builds a new one with the `with_*` methods.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: BTreeMap<String, String>,
    cookie: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a header, consuming and returning the context.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merge a whole header map on top of the current one.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.headers.insert(k.into(), v.into());
        }
        self
    }

    /// Set the `Cookie` header value verbatim.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Pin the User-Agent instead of drawing a random one per attempt.
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Override the client-level request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
