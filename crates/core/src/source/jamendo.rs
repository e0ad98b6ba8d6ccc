//! Jamendo source adapter (https://www.jamendo.com).
//!
//! Jamendo's search API returns, per track, a map of quality-keyed stream
//! URLs. Each track becomes a ranked candidate chain (flac > ogg > mp3)
//! evaluated through the quality chain; tracks whose every variant is dead
//! are dropped silently.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::net::{HttpClient, RequestContext};
use crate::resolve::{Candidate, QualityChain, QualityTier};

use super::registry::AdapterContext;
use super::types::{MediaQuery, MediaRecord, SourceAdapter, SourceError};

const SEARCH_URL: &str = "https://www.jamendo.com/api/search";

/// Quality keys as they appear in the API payload, ranked best first.
const QUALITY_ORDER: &[(&str, QualityTier)] = &[
    ("flac", QualityTier::Lossless),
    ("ogg", QualityTier::High),
    ("mp3", QualityTier::Standard),
];

pub struct JamendoAdapter {
    ctx: AdapterContext,
}

impl JamendoAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    fn http(&self) -> &HttpClient {
        &self.ctx.http
    }

    fn chain(&self) -> &QualityChain {
        &self.ctx.chain
    }

    /// Per-call context with the site headers this API wants to see.
    fn request_context(&self, base: &RequestContext) -> RequestContext {
        base.clone()
            .with_header("referer", "https://www.jamendo.com/search")
            .with_header("x-requested-with", "XMLHttpRequest")
            .with_headers(self.ctx.settings.headers.clone())
    }
}

#[async_trait]
impl SourceAdapter for JamendoAdapter {
    fn name(&self) -> &str {
        "jamendo"
    }

    async fn build_queries(
        &self,
        keyword: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<MediaQuery>, SourceError> {
        // The API takes the full result cap in one call; one page per run.
        let url = format!(
            "{}?query={}&type=track&limit={}&identities=www",
            SEARCH_URL,
            urlencoding::encode(keyword),
            self.ctx.settings.search_size,
        );
        Ok(vec![MediaQuery::new(self.name(), 0, url)])
    }

    async fn execute_query(
        &self,
        query: &MediaQuery,
        ctx: &RequestContext,
    ) -> Result<Vec<MediaRecord>, SourceError> {
        let ctx = self.request_context(ctx);
        let resp = self.http().get(&query.url, &ctx).await?;
        let tracks: Vec<JamendoTrack> =
            resp.json().await.map_err(|e| SourceError::Payload {
                url: query.url.clone(),
                reason: e.to_string(),
            })?;

        let mut records = Vec::new();
        for track in tracks {
            let Some(id) = track.id_string() else {
                continue;
            };
            let Some(streams) = track.download.as_ref().or(track.stream.as_ref()) else {
                continue;
            };

            let candidates: Vec<Candidate> = QUALITY_ORDER
                .iter()
                .filter_map(|(quality, tier)| {
                    streams
                        .get(*quality)
                        .filter(|url| !url.is_empty())
                        .map(|url| Candidate::fixed(*tier, url.clone()).with_declared_ext(*quality))
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let Some(link) = self.chain().resolve(&candidates, &ctx).await.resolved() else {
                debug!(source = self.name(), track = %id, "no candidate validated");
                continue;
            };

            let mut record = MediaRecord::from_link(
                self.name(),
                format!("jamendo:{id}"),
                track.name.clone().unwrap_or_else(|| "NULL".to_string()),
                link,
            );
            record.artists = track
                .artist
                .and_then(|a| a.name)
                .unwrap_or_else(|| "NULL".to_string());
            record.album = track
                .album
                .and_then(|a| a.name)
                .unwrap_or_else(|| "NULL".to_string());
            record.duration_secs = track.duration;
            record.cover_url = track.cover;
            records.push(record);

            if records.len() >= self.ctx.settings.search_size {
                break;
            }
        }

        Ok(records)
    }
}

// Jamendo API response types
#[derive(Debug, Deserialize)]
struct JamendoTrack {
    id: Option<serde_json::Value>,
    name: Option<String>,
    duration: Option<u32>,
    artist: Option<JamendoName>,
    album: Option<JamendoName>,
    cover: Option<String>,
    download: Option<BTreeMap<String, String>>,
    stream: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct JamendoName {
    name: Option<String>,
}

impl JamendoTrack {
    /// Track ids arrive as numbers or strings depending on the endpoint.
    fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::HttpPolicy;
    use crate::validator::LinkValidator;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_with(settings: crate::config::SourceSettings) -> JamendoAdapter {
        let http = HttpClient::new(HttpPolicy {
            max_retries: 1,
            ..HttpPolicy::default()
        })
        .unwrap();
        let chain = QualityChain::new(LinkValidator::new(http.clone()));
        JamendoAdapter::new(AdapterContext {
            settings,
            http,
            chain,
        })
    }

    fn adapter() -> JamendoAdapter {
        adapter_with(crate::config::SourceSettings::default())
    }

    #[tokio::test]
    async fn test_build_queries_is_one_page() {
        let queries = adapter()
            .build_queries("four seasons", &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].source, "jamendo");
        assert_eq!(queries[0].page_index, 0);
        assert!(queries[0].url.contains("query=four%20seasons"));
        assert!(queries[0].url.contains("limit=5"));
    }

    #[test]
    fn test_id_string_handles_both_shapes() {
        let number: JamendoTrack = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(number.id_string().as_deref(), Some("42"));

        let string: JamendoTrack = serde_json::from_str(r#"{"id": "t99"}"#).unwrap();
        assert_eq!(string.id_string().as_deref(), Some("t99"));

        let empty: JamendoTrack = serde_json::from_str(r#"{"id": ""}"#).unwrap();
        assert!(empty.id_string().is_none());
    }

    #[tokio::test]
    async fn test_execute_query_resolves_best_quality() {
        let server = MockServer::start().await;

        // flac variant is dead, ogg answers.
        Mock::given(method("HEAD"))
            .and(path("/audio/dead.flac"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/audio/live.ogg"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/audio/live.ogg"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(b"OggS\x00\x02rest-of-page".to_vec()),
            )
            .mount(&server)
            .await;

        let payload = serde_json::json!([{
            "id": 7,
            "name": "Winter",
            "duration": 201,
            "artist": {"name": "Ensemble"},
            "album": {"name": "Seasons"},
            "stream": {
                "flac": format!("{}/audio/dead.flac", server.uri()),
                "ogg": format!("{}/audio/live.ogg", server.uri()),
            },
        }]);
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("type", "track"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let adapter = adapter();
        let query = MediaQuery::new(
            "jamendo",
            0,
            format!("{}/api/search?query=winter&type=track", server.uri()),
        );
        let records = adapter
            .execute_query(&query, &RequestContext::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.identifier, "jamendo:7");
        assert_eq!(record.artists, "Ensemble");
        assert_eq!(record.ext(), Some("ogg"));
        assert!(record.is_valid());
    }

    #[tokio::test]
    async fn test_execute_query_drops_unresolvable_tracks() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let payload = serde_json::json!([{
            "id": 1,
            "name": "Gone",
            "stream": {"mp3": format!("{}/gone.mp3", server.uri())},
        }]);
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let query = MediaQuery::new("jamendo", 0, format!("{}/api/search", server.uri()));
        let records = adapter()
            .execute_query(&query, &RequestContext::new())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_execute_query_bad_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>denied</html>"))
            .mount(&server)
            .await;

        let query = MediaQuery::new("jamendo", 0, format!("{}/api/search", server.uri()));
        let result = adapter()
            .execute_query(&query, &RequestContext::new())
            .await;
        assert!(matches!(result, Err(SourceError::Payload { .. })));
    }
}
