//! Reachability testing and deep content probing for resolved URLs.

use std::time::Instant;

use futures::StreamExt;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use tracing::debug;

use crate::net::{HttpClient, RequestContext};

use super::sniff::{ext_from_mime, sniff_audio_ext};
use super::types::{ProbeReport, ValidationResult};

/// How much of the payload a probe reads before giving up on magic bytes.
const PROBE_WINDOW_BYTES: usize = 8 * 1024;

/// Tests URL reachability and probes true content type and size.
///
/// Both operations are idempotent and side-effect-free on caller state; every
/// call goes through the engine's session policy, so concurrent calls against
/// the same host share no mutable session.
#[derive(Clone)]
pub struct LinkValidator {
    http: HttpClient,
}

impl LinkValidator {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Lightweight existence check: HEAD, falling back to a zero-length
    /// ranged GET when the server rejects HEAD outright. Never errors; any
    /// failure maps to `reachable = false`.
    pub async fn test(&self, url: &str, ctx: &RequestContext) -> ValidationResult {
        let start = Instant::now();

        let resp = match self.http.head(url, ctx).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url, error = %e, "HEAD failed");
                let mut result = ValidationResult::unreachable(elapsed_ms(start));
                result.http_status = e.status();
                return result;
            }
        };

        let mut status = resp.status();
        if head_unsupported(status) {
            status = match self.http.get_range(url, ctx, "bytes=0-0").await {
                Ok(resp) => resp.status(),
                Err(e) => {
                    debug!(url, error = %e, "ranged fallback failed");
                    let mut result = ValidationResult::unreachable(elapsed_ms(start));
                    result.http_status = e.status();
                    return result;
                }
            };
        }

        ValidationResult {
            reachable: status.is_success(),
            http_status: Some(status.as_u16()),
            sniffed_ext: None,
            sniffed_size_bytes: None,
            latency_ms: elapsed_ms(start),
        }
    }

    /// Deep content probe: a ranged read of the first few kilobytes, used to
    /// correct the extension and size declared upstream. Never errors;
    /// whatever could not be determined stays `None`.
    pub async fn probe(&self, url: &str, ctx: &RequestContext) -> ProbeReport {
        let range = format!("bytes=0-{}", PROBE_WINDOW_BYTES - 1);
        let resp = match self.http.get_range(url, ctx, &range).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url, error = %e, "probe request failed");
                return ProbeReport::default();
            }
        };

        if !resp.status().is_success() {
            debug!(url, status = %resp.status(), "probe got non-success status");
            return ProbeReport::default();
        }

        let size_bytes = total_size(&resp);
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let prefix = read_prefix(resp).await;
        let ext = sniff_audio_ext(&prefix)
            .or_else(|| content_type.as_deref().and_then(ext_from_mime))
            .map(str::to_string)
            .or_else(|| ext_from_url(url));

        ProbeReport { ext, size_bytes }
    }
}

fn head_unsupported(status: StatusCode) -> bool {
    status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Full resource size: the `Content-Range` total for a partial response,
/// `Content-Length` when the server ignored the range and sent everything.
fn total_size(resp: &Response) -> Option<u64> {
    if resp.status() == StatusCode::PARTIAL_CONTENT {
        let header = resp.headers().get(CONTENT_RANGE)?.to_str().ok()?;
        let total = header.rsplit('/').next()?;
        total.parse().ok()
    } else {
        resp.content_length()
    }
}

/// Read up to the probe window from the body, then drop the connection.
async fn read_prefix(resp: Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PROBE_WINDOW_BYTES.min(4096));
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                let room = PROBE_WINDOW_BYTES.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if buf.len() >= PROBE_WINDOW_BYTES {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    buf
}

/// Last-resort extension guess from the URL path.
fn ext_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_from_url_strips_query() {
        assert_eq!(
            ext_from_url("https://cdn.example.com/track.flac?sig=abc&ts=1"),
            Some("flac".to_string())
        );
    }

    #[test]
    fn test_ext_from_url_rejects_long_or_missing() {
        assert_eq!(ext_from_url("https://example.com/api/stream"), None);
        assert_eq!(ext_from_url("https://example.com/file.verylongext"), None);
    }

    #[test]
    fn test_ext_from_url_lowercases() {
        assert_eq!(
            ext_from_url("https://example.com/SONG.MP3"),
            Some("mp3".to_string())
        );
    }

    #[test]
    fn test_head_unsupported_statuses() {
        assert!(head_unsupported(StatusCode::METHOD_NOT_ALLOWED));
        assert!(head_unsupported(StatusCode::NOT_IMPLEMENTED));
        assert!(!head_unsupported(StatusCode::NOT_FOUND));
    }
}
