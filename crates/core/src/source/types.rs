//! Types for the multi-source search system.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::{NetError, RequestContext};
use crate::resolve::ResolvedLink;
use crate::validator::ValidationResult;

/// One unit of search work: a single page of a single source. Produced by an
/// adapter, consumed once by exactly one search task, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaQuery {
    /// Adapter that built this query.
    pub source: String,
    /// Page number, unique within one adapter's query list. Also the key
    /// that keeps an adapter's output in its original order after fan-in.
    pub page_index: u32,
    /// Fully built upstream request URL (query parameters already encoded).
    pub url: String,
}

impl MediaQuery {
    pub fn new(source: impl Into<String>, page_index: u32, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page_index,
            url: url.into(),
        }
    }
}

/// The downloadable side of a record: either a single validated URL, or a
/// composite whose children are records of their own (episode lists, multi
/// part dramas). Validity is computed bottom-up and is never partial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Leaf {
        /// Resolved, validated download URL.
        url: String,
        /// File extension, corrected by the probe where possible.
        ext: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_bytes: Option<u64>,
        /// Validation outcome for `url`.
        validation: ValidationResult,
        /// Headers the download must present (some CDNs check referer/UA).
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        download_headers: BTreeMap<String, String>,
        /// Scratch directory to remove once the item is safely on disk.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scratch_dir: Option<PathBuf>,
    },
    Composite {
        children: Vec<MediaRecord>,
    },
}

/// Durable result unit handed from a search task into the aggregation point.
///
/// A record is produced by exactly one worker; after hand-off it is only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Stable identifier used for deduplication. Adapters namespace these
    /// (`"jamendo:1234"`, `"tunehub:kuwo:98"`) so records surfaced by two
    /// adapters for the same underlying item collapse to one.
    pub identifier: String,
    pub title: String,
    pub artists: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Name of the adapter that produced this record.
    pub source: String,
    pub payload: RecordPayload,
}

impl MediaRecord {
    /// Build a leaf record from a winning resolution.
    pub fn from_link(
        source: impl Into<String>,
        identifier: impl Into<String>,
        title: impl Into<String>,
        link: ResolvedLink,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            artists: String::new(),
            album: String::new(),
            duration_secs: None,
            lyric: None,
            cover_url: None,
            source: source.into(),
            payload: RecordPayload::Leaf {
                url: link.url,
                ext: link.ext.unwrap_or_else(|| "mp3".to_string()),
                size_bytes: link.size_bytes,
                validation: link.validation,
                download_headers: BTreeMap::new(),
                scratch_dir: None,
            },
        }
    }

    /// Build a composite record over child records.
    pub fn composite(
        source: impl Into<String>,
        identifier: impl Into<String>,
        title: impl Into<String>,
        children: Vec<MediaRecord>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            artists: String::new(),
            album: String::new(),
            duration_secs: None,
            lyric: None,
            cover_url: None,
            source: source.into(),
            payload: RecordPayload::Composite { children },
        }
    }

    /// A leaf is valid iff its URL tested reachable; a composite is valid iff
    /// it has children and every one of them is valid. Never partially valid.
    pub fn is_valid(&self) -> bool {
        match &self.payload {
            RecordPayload::Leaf { validation, .. } => validation.reachable,
            RecordPayload::Composite { children } => {
                !children.is_empty() && children.iter().all(MediaRecord::is_valid)
            }
        }
    }

    /// The resolved URL, for leaf records.
    pub fn url(&self) -> Option<&str> {
        match &self.payload {
            RecordPayload::Leaf { url, .. } => Some(url),
            RecordPayload::Composite { .. } => None,
        }
    }

    /// The file extension, for leaf records.
    pub fn ext(&self) -> Option<&str> {
        match &self.payload {
            RecordPayload::Leaf { ext, .. } => Some(ext),
            RecordPayload::Composite { .. } => None,
        }
    }

    /// Declared-or-probed size in bytes, for leaf records.
    pub fn size_bytes(&self) -> Option<u64> {
        match &self.payload {
            RecordPayload::Leaf { size_bytes, .. } => *size_bytes,
            RecordPayload::Composite { .. } => None,
        }
    }
}

/// Errors an adapter can surface. Expected upstream misses are not errors
/// (adapters return an empty list); these cover the genuinely broken cases
/// the orchestrator isolates to one task.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] NetError),

    #[error("unexpected payload from {url}: {reason}")]
    Payload { url: String, reason: String },
}

/// A source-specific component that queries one upstream platform.
///
/// `build_queries` plans the pages to fetch for a keyword; `execute_query`
/// runs one page and returns fully resolved records. Implementations must
/// not fail for expected upstream misses — an empty list is the answer.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name used for registry lookup, logging and record tagging.
    fn name(&self) -> &str;

    async fn build_queries(
        &self,
        keyword: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<MediaQuery>, SourceError>;

    async fn execute_query(
        &self,
        query: &MediaQuery,
        ctx: &RequestContext,
    ) -> Result<Vec<MediaRecord>, SourceError>;
}
