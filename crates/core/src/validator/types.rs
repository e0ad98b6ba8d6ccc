//! Types produced by link validation.

use serde::{Deserialize, Serialize};

/// Outcome of a reachability test for one URL.
///
/// Never an error: any network or protocol failure is folded into
/// `reachable = false` so callers can treat validation as a pure predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the URL answered with a success status.
    pub reachable: bool,
    /// Final HTTP status, when the server answered at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Extension sniffed from content, when a probe ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniffed_ext: Option<String>,
    /// True size in bytes, when a probe could determine it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniffed_size_bytes: Option<u64>,
    /// Wall-clock latency of the test call.
    pub latency_ms: u64,
}

impl ValidationResult {
    /// An unreachable result with no response data.
    pub fn unreachable(latency_ms: u64) -> Self {
        Self {
            reachable: false,
            http_status: None,
            sniffed_ext: None,
            sniffed_size_bytes: None,
            latency_ms,
        }
    }

    /// Fold a probe's findings into this result.
    pub fn with_probe(mut self, probe: &ProbeReport) -> Self {
        self.sniffed_ext = probe.ext.clone();
        self.sniffed_size_bytes = probe.size_bytes;
        self
    }
}

/// Findings of a deep content probe. Fields stay `None` when the server gave
/// nothing to work with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    pub ext: Option<String>,
    pub size_bytes: Option<u64>,
}
