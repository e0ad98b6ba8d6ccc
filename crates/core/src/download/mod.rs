//! Streaming download orchestration.
//!
//! Resolved records are grouped by source and pulled down on one bounded
//! worker pool per source, mirroring the search fan-out. Each item streams
//! to a collision-free path with live progress; a failed item costs exactly
//! itself.

mod orchestrator;
mod types;

pub use orchestrator::DownloadOrchestrator;
pub use types::{
    DownloadConfig, DownloadError, DownloadFailure, DownloadObserver, DownloadOutcome,
    DownloadedRecord, EnrichmentHook, NoopEnrichment, NoopObserver, DOWNLOAD_SNAPSHOT_FILE,
};
