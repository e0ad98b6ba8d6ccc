//! Per-run diagnostic snapshots.
//!
//! Each run that produced anything gets a timestamped, keyword-derived
//! working directory under the configured root, holding the serialized
//! record list. Diagnostic and resume data, not a queryable index.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fsutil::sanitize_component;
use crate::source::MediaRecord;

use super::types::TaskFailure;

pub const SEARCH_SNAPSHOT_FILE: &str = "search_results.json";

/// Everything worth keeping about one run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub keyword: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TaskFailure>,
    pub records: Vec<MediaRecord>,
}

/// Directory name for one run: local timestamp plus the keyword with its
/// whitespace squeezed out.
fn run_dir_name(keyword: &str) -> String {
    let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let keyword: String = keyword.split_whitespace().collect();
    sanitize_component(&format!("{stamp} {keyword}"))
}

/// Create the run working directory under `root`.
pub async fn create_run_dir(root: &Path, keyword: &str) -> std::io::Result<PathBuf> {
    let dir = root.join(run_dir_name(keyword));
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Serialize a report into `dir/file`, returning the written path.
pub async fn write_report(
    dir: &Path,
    file: &str,
    report: &RunReport,
) -> std::io::Result<PathBuf> {
    let path = dir.join(file);
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
