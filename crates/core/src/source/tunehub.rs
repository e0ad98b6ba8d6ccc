//! TuneHub aggregator adapter (https://music-dl.sayqz.com).
//!
//! TuneHub fronts several upstream platforms behind one API. Search is paged
//! per upstream site; a track's playable URL is not in the search payload at
//! all — each quality must be resolved through the aggregator's `type=url`
//! endpoint, which answers with a redirect to the actual file. Those
//! API-backed resolvers are exactly what the quality chain evaluates.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::net::{HttpClient, RequestContext};
use crate::resolve::{Candidate, QualityChain, QualityTier, ResolveError, UrlResolver};

use super::registry::AdapterContext;
use super::types::{MediaQuery, MediaRecord, SourceAdapter, SourceError};

const API_URL: &str = "https://music-dl.sayqz.com/api";

/// Upstream platforms the aggregator exposes.
const SITES: &[&str] = &["kuwo", "kugou", "migu"];

/// Aggregator bitrate labels, ranked best first.
const QUALITY_ORDER: &[(&str, QualityTier)] = &[
    ("flac24bit", QualityTier::Lossless),
    ("flac", QualityTier::Lossless),
    ("320k", QualityTier::High),
    ("128k", QualityTier::Standard),
];

pub struct TuneHubAdapter {
    ctx: AdapterContext,
    api_url: String,
}

impl TuneHubAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self {
            ctx,
            api_url: API_URL.to_string(),
        }
    }

    /// Point the adapter at a different API root; used by tests.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn http(&self) -> &HttpClient {
        &self.ctx.http
    }

    fn chain(&self) -> &QualityChain {
        &self.ctx.chain
    }

    fn request_context(&self, base: &RequestContext) -> RequestContext {
        base.clone().with_headers(self.ctx.settings.headers.clone())
    }
}

#[async_trait]
impl SourceAdapter for TuneHubAdapter {
    fn name(&self) -> &str {
        "tunehub"
    }

    async fn build_queries(
        &self,
        keyword: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<MediaQuery>, SourceError> {
        let page_size = self.ctx.settings.effective_page_size();
        let mut queries = Vec::new();
        let mut page_index = 0u32;

        for site in SITES {
            let mut count = 0usize;
            let mut page = 1usize;
            while count < self.ctx.settings.search_size {
                let url = format!(
                    "{}?type=search&source={}&keyword={}&page={}&limit={}",
                    self.api_url,
                    site,
                    urlencoding::encode(keyword),
                    page,
                    page_size,
                );
                queries.push(MediaQuery::new(self.name(), page_index, url));
                page_index += 1;
                page += 1;
                count += page_size;
            }
        }

        Ok(queries)
    }

    async fn execute_query(
        &self,
        query: &MediaQuery,
        ctx: &RequestContext,
    ) -> Result<Vec<MediaRecord>, SourceError> {
        let ctx = self.request_context(ctx);
        let resp = self.http().get(&query.url, &ctx).await?;
        let reply: TuneHubSearchReply =
            resp.json().await.map_err(|e| SourceError::Payload {
                url: query.url.clone(),
                reason: e.to_string(),
            })?;

        let tracks = reply.data.map(|d| d.results).unwrap_or_default();
        let mut records = Vec::new();

        for track in tracks {
            let Some(id) = track.id_string() else {
                continue;
            };
            let Some(site) = track.site() else {
                continue;
            };

            let candidates: Vec<Candidate> = QUALITY_ORDER
                .iter()
                .map(|(quality, tier)| {
                    Candidate::new(
                        *tier,
                        Arc::new(TuneHubUrlResolver {
                            http: self.http().clone(),
                            api_url: self.api_url.clone(),
                            id: id.clone(),
                            site: site.clone(),
                            quality: quality.to_string(),
                        }),
                    )
                })
                .collect();

            let Some(link) = self.chain().resolve(&candidates, &ctx).await.resolved() else {
                debug!(source = self.name(), track = %id, site = %site, "no quality validated");
                continue;
            };

            let mut record = MediaRecord::from_link(
                self.name(),
                format!("tunehub:{site}:{id}"),
                text_or_null(&track.name),
                link,
            );
            record.artists = text_or_null(&track.artist);
            record.album = text_or_null(&track.album);
            record.cover_url = track.pic.clone();
            record.lyric = self.fetch_lyric(track.lrc.as_deref(), &ctx).await;
            records.push(record);

            if records.len() >= self.ctx.settings.effective_page_size() {
                break;
            }
        }

        Ok(records)
    }
}

impl TuneHubAdapter {
    /// Lyric text is nice to have, never load-bearing.
    async fn fetch_lyric(&self, lrc_url: Option<&str>, ctx: &RequestContext) -> Option<String> {
        let url = lrc_url?;
        if !url.starts_with("http") {
            return None;
        }
        match self.http().get(url, ctx).await {
            Ok(resp) => resp.text().await.ok().filter(|t| !t.is_empty()),
            Err(e) => {
                debug!(url, error = %e, "lyric fetch failed");
                None
            }
        }
    }
}

/// Resolves one (track, quality) pair through the aggregator's URL endpoint.
/// The endpoint answers with a redirect chain ending at the real file; the
/// final URL is the result.
struct TuneHubUrlResolver {
    http: HttpClient,
    api_url: String,
    id: String,
    site: String,
    quality: String,
}

#[async_trait]
impl UrlResolver for TuneHubUrlResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Result<String, ResolveError> {
        let url = format!(
            "{}?type=url&source={}&id={}&br={}",
            self.api_url,
            self.site,
            urlencoding::encode(&self.id),
            self.quality,
        );
        let resp = self.http.head(&url, ctx).await?;
        if !resp.status().is_success() {
            return Err(ResolveError::Payload {
                url,
                reason: format!("HTTP {}", resp.status()),
            });
        }
        let final_url = resp.url().to_string();
        if final_url == url {
            // No redirect happened; the endpoint had nothing for this quality.
            return Err(ResolveError::Empty);
        }
        Ok(final_url)
    }
}

// TuneHub API response types
#[derive(Debug, Deserialize)]
struct TuneHubSearchReply {
    #[serde(default)]
    data: Option<TuneHubData>,
}

#[derive(Debug, Deserialize)]
struct TuneHubData {
    #[serde(default)]
    results: Vec<TuneHubTrack>,
}

#[derive(Debug, Deserialize)]
struct TuneHubTrack {
    id: Option<serde_json::Value>,
    name: Option<serde_json::Value>,
    artist: Option<serde_json::Value>,
    album: Option<serde_json::Value>,
    /// Upstream platform; some payloads call it `platform`, some `source`.
    platform: Option<String>,
    source: Option<String>,
    pic: Option<String>,
    lrc: Option<String>,
}

impl TuneHubTrack {
    fn id_string(&self) -> Option<String> {
        value_text(self.id.as_ref()?)
    }

    fn site(&self) -> Option<String> {
        self.platform
            .clone()
            .or_else(|| self.source.clone())
            .filter(|s| !s.is_empty())
    }
}

/// Flatten a JSON value that may be a string, number, or list of strings.
fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn text_or_null(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .and_then(value_text)
        .unwrap_or_else(|| "NULL".to_string())
}
