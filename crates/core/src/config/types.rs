use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    /// Per-source settings, keyed by adapter name.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSettings>,
}

/// Run-level settings shared by search and download.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Root directory for run working directories and downloaded files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Wall-clock bound on one search run's aggregation wait.
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    /// How many adapters may fan out concurrently.
    #[serde(default = "default_adapter_fanout")]
    pub adapter_fanout: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            search_timeout_secs: default_search_timeout(),
            adapter_fanout: default_adapter_fanout(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_search_timeout() -> u64 {
    30
}

fn default_adapter_fanout() -> usize {
    10
}

/// Network behavior shared by every upstream call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Bounded retries for one HTTP call (fresh session per attempt).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Reuse one shared session instead of rebuilding per call.
    #[serde(default)]
    pub reuse_session: bool,
    /// Optional proxy URL applied to every session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
            reuse_session: false,
            proxy: None,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    15
}

/// Settings for one source adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Concurrent query workers for this source.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How many results the source should yield per run.
    #[serde(default = "default_search_size")]
    pub search_size: usize,
    /// Results requested per upstream page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Extra headers sent with every call to this source.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            workers: default_workers(),
            search_size: default_search_size(),
            page_size: default_page_size(),
            headers: BTreeMap::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_workers() -> usize {
    5
}

fn default_search_size() -> usize {
    5
}

fn default_page_size() -> usize {
    10
}

impl SourceSettings {
    /// Effective page size: never larger than the per-run result cap.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.min(self.search_size).max(1)
    }
}
