//! Types for search orchestration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::source::MediaRecord;

/// Lifecycle of one search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    FanningOut,
    Aggregating,
    Deduplicating,
    Done,
}

/// One task's failure, preserved for the outcome and the snapshot. A failure
/// contributes zero records and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub source: String,
    /// Page the task was running; `None` when query planning itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    pub error: String,
}

/// What one search run produced. Zero records is a normal outcome;
/// "nothing found" and "something broke" are distinguished by `failures`
/// and the logs, never by an error.
#[derive(Debug)]
pub struct SearchOutcome {
    pub run_id: Uuid,
    pub keyword: String,
    pub records: Vec<MediaRecord>,
    pub failures: Vec<TaskFailure>,
    pub duration_ms: u64,
    /// Run working directory, when a snapshot was written.
    pub work_dir: Option<PathBuf>,
}

/// Knobs for one search run.
#[derive(Debug, Clone)]
pub struct SearchRunConfig {
    /// How many adapters may be active at once.
    pub adapter_fanout: usize,
    /// Wall-clock bound on the aggregation wait; tasks still running at the
    /// deadline are abandoned in place and contribute zero records.
    pub run_timeout: Duration,
    /// Root under which run working directories are created.
    pub work_dir: PathBuf,
    /// Query workers per adapter unless overridden.
    pub default_workers: usize,
    pub per_source_workers: BTreeMap<String, usize>,
}

impl Default for SearchRunConfig {
    fn default() -> Self {
        Self {
            adapter_fanout: 10,
            run_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("downloads"),
            default_workers: 5,
            per_source_workers: BTreeMap::new(),
        }
    }
}

impl SearchRunConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            adapter_fanout: config.run.adapter_fanout,
            run_timeout: Duration::from_secs(config.run.search_timeout_secs),
            work_dir: config.run.work_dir.clone(),
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
