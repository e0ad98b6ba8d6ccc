//! Short-circuiting evaluation of ranked candidate chains.

use tracing::debug;

use crate::net::RequestContext;
use crate::validator::LinkValidator;

use super::types::{Candidate, ResolvedLink, Resolution};

/// Evaluates ranked candidates against the link validator.
///
/// The contract is strict short-circuit: the first candidate whose resolved
/// URL tests reachable wins, gets one probe to correct its metadata, and no
/// lower-ranked candidate is ever evaluated afterwards. Exhaustion yields
/// [`Resolution::Unresolved`], never an error.
#[derive(Clone)]
pub struct QualityChain {
    validator: LinkValidator,
}

impl QualityChain {
    pub fn new(validator: LinkValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &LinkValidator {
        &self.validator
    }

    /// Walk the candidates in order and return the first that validates.
    pub async fn resolve(&self, candidates: &[Candidate], ctx: &RequestContext) -> Resolution {
        for candidate in candidates {
            let url = match candidate.resolver.resolve(ctx).await {
                Ok(url) => url,
                Err(e) => {
                    debug!(tier = ?candidate.tier, error = %e, "candidate failed to resolve");
                    continue;
                }
            };

            let validation = self.validator.test(&url, ctx).await;
            if !validation.reachable {
                debug!(tier = ?candidate.tier, url, status = ?validation.http_status, "candidate unreachable");
                continue;
            }

            let probe = self.validator.probe(&url, ctx).await;
            let validation = validation.with_probe(&probe);

            return Resolution::Resolved(ResolvedLink {
                url,
                ext: probe.ext.or_else(|| candidate.declared_ext.clone()),
                size_bytes: probe.size_bytes.or(candidate.declared_size),
                tier: candidate.tier,
                pinned: candidate.pinned,
                validation,
            });
        }

        Resolution::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::net::{HttpClient, HttpPolicy};
    use crate::resolve::types::{QualityTier, ResolveError, UrlResolver};

    use super::*;

    /// Resolver that counts its invocations, for short-circuit assertions.
    struct CountingResolver {
        url: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UrlResolver for CountingResolver {
        async fn resolve(&self, _ctx: &RequestContext) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.url.clone())
        }
    }

    fn counting_candidate(
        tier: QualityTier,
        url: &str,
    ) -> (Candidate, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let candidate = Candidate::new(
            tier,
            Arc::new(CountingResolver {
                url: url.to_string(),
                calls: Arc::clone(&calls),
            }),
        );
        (candidate, calls)
    }

    fn chain() -> QualityChain {
        let policy = HttpPolicy {
            max_retries: 1,
            ..HttpPolicy::default()
        };
        QualityChain::new(LinkValidator::new(HttpClient::new(policy).unwrap()))
    }

    async fn serve_audio(server: &MockServer, route: &str, body: Vec<u8>) {
        Mock::given(method("HEAD"))
            .and(path(route.to_string()))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(route.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    async fn serve_missing(server: &MockServer, route: &str) {
        Mock::given(method("HEAD"))
            .and(path(route.to_string()))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    fn mp3_body(len: usize) -> Vec<u8> {
        let mut body = b"ID3\x03\x00\x00\x00".to_vec();
        body.resize(len, 0);
        body
    }

    #[tokio::test]
    async fn test_first_reachable_candidate_wins() {
        let server = MockServer::start().await;
        serve_missing(&server, "/flac").await;
        serve_audio(&server, "/mp3", mp3_body(64)).await;

        let (dead, dead_calls) =
            counting_candidate(QualityTier::Lossless, &format!("{}/flac", server.uri()));
        let (live, live_calls) =
            counting_candidate(QualityTier::Standard, &format!("{}/mp3", server.uri()));

        let resolution = chain()
            .resolve(&[dead, live], &RequestContext::new())
            .await;

        let link = resolution.resolved().expect("should resolve");
        assert!(link.url.ends_with("/mp3"));
        assert_eq!(link.ext.as_deref(), Some("mp3"));
        assert_eq!(dead_calls.load(Ordering::SeqCst), 1);
        assert_eq!(live_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_lower_ranked() {
        let server = MockServer::start().await;
        serve_audio(&server, "/first", mp3_body(64)).await;

        let (first, first_calls) =
            counting_candidate(QualityTier::Lossless, &format!("{}/first", server.uri()));
        let (second, second_calls) =
            counting_candidate(QualityTier::Standard, &format!("{}/never", server.uri()));

        let resolution = chain()
            .resolve(&[first, second], &RequestContext::new())
            .await;

        assert!(resolution.is_resolved());
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        // The lower-ranked resolver must never have been invoked.
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_is_a_sentinel() {
        let server = MockServer::start().await;
        serve_missing(&server, "/a").await;
        serve_missing(&server, "/b").await;

        let candidates = vec![
            Candidate::fixed(QualityTier::Lossless, format!("{}/a", server.uri())),
            Candidate::fixed(QualityTier::Standard, format!("{}/b", server.uri())),
        ];

        let resolution = chain().resolve(&candidates, &RequestContext::new()).await;
        assert!(!resolution.is_resolved());
    }

    #[tokio::test]
    async fn test_failed_resolver_moves_to_next() {
        let server = MockServer::start().await;
        serve_audio(&server, "/ok", mp3_body(64)).await;

        let candidates = vec![
            // Resolver error, not a validation failure.
            Candidate::fixed(QualityTier::Lossless, "garbage"),
            Candidate::fixed(QualityTier::Standard, format!("{}/ok", server.uri())),
        ];

        let resolution = chain().resolve(&candidates, &RequestContext::new()).await;
        assert!(resolution.is_resolved());
    }

    #[tokio::test]
    async fn test_probe_corrects_declared_metadata() {
        let server = MockServer::start().await;
        serve_audio(&server, "/track", mp3_body(5000)).await;

        let candidates = vec![Candidate::fixed(
            QualityTier::Standard,
            format!("{}/track", server.uri()),
        )
        .with_declared_ext("aac")
        .with_declared_size(1)];

        let link = chain()
            .resolve(&candidates, &RequestContext::new())
            .await
            .resolved()
            .unwrap();

        assert_eq!(link.ext.as_deref(), Some("mp3"));
        assert_eq!(link.size_bytes, Some(5000));
    }
}
