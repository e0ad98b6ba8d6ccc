//! Types for download orchestration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::net::NetError;
use crate::source::MediaRecord;

pub const DOWNLOAD_SNAPSHOT_FILE: &str = "download_results.json";

/// Transfer or write failure for one item. Caught at the item boundary;
/// siblings and the pool are unaffected.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("transfer request failed: {0}")]
    Http(#[from] NetError),

    #[error("transfer from {url} broke mid-stream: {reason}")]
    Transfer { url: String, reason: String },

    #[error("disk write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record has no downloadable payload")]
    NotDownloadable,
}

/// Worker counts for the per-source download pools.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub default_workers: usize,
    pub per_source_workers: BTreeMap<String, usize>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_workers: 5,
            per_source_workers: BTreeMap::new(),
        }
    }
}

impl DownloadConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_workers: 5,
            per_source_workers: config
                .sources
                .iter()
                .map(|(name, settings)| (name.clone(), settings.workers))
                .collect(),
        }
    }

    pub fn workers_for(&self, source: &str) -> usize {
        self.per_source_workers
            .get(source)
            .copied()
            .unwrap_or(self.default_workers)
            .max(1)
    }
}

/// One item safely on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedRecord {
    pub record: MediaRecord,
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// One item that did not make it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub source: String,
    pub identifier: String,
    pub title: String,
    pub error: String,
}

/// What one download run produced.
#[derive(Debug, Default)]
pub struct DownloadOutcome {
    pub completed: Vec<DownloadedRecord>,
    pub failures: Vec<DownloadFailure>,
}

/// Per-item progress callbacks.
///
/// `started` carries the best total known up front (Content-Length, falling
/// back to the probed size); `rebased` fires when an indeterminate or wrong
/// total is replaced by the true byte count.
pub trait DownloadObserver: Send + Sync {
    fn started(&self, _id: usize, _record: &MediaRecord, _total_bytes: Option<u64>) {}
    fn advanced(&self, _id: usize, _bytes_done: u64, _total_bytes: Option<u64>) {}
    fn rebased(&self, _id: usize, _total_bytes: u64) {}
    fn completed(&self, _id: usize, _path: &Path) {}
    fn failed(&self, _id: usize, _error: &DownloadError) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}

/// Post-write enrichment seam (tag writing, true-duration correction).
/// Invoked best-effort after an item lands on disk; failures are swallowed
/// by the orchestrator.
#[async_trait]
pub trait EnrichmentHook: Send + Sync {
    async fn enrich(&self, path: &Path, record: &MediaRecord) -> anyhow::Result<MediaRecord>;
}

/// Hook that hands the record back untouched.
pub struct NoopEnrichment;

#[async_trait]
impl EnrichmentHook for NoopEnrichment {
    async fn enrich(&self, _path: &Path, record: &MediaRecord) -> anyhow::Result<MediaRecord> {
        Ok(record.clone())
    }
}
