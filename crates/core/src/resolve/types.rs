//! Types for the quality resolution chain.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::{NetError, RequestContext};
use crate::validator::ValidationResult;

/// Ranked bitrate/format class. Ordering is quality-descending in candidate
/// lists; the enum itself orders `Lossless < High < Standard` so that sorting
/// ascending yields highest quality first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Lossless,
    High,
    Standard,
}

/// Errors a resolution strategy can produce. These never escape the chain;
/// a failed strategy just moves evaluation to the next candidate.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("upstream request failed: {0}")]
    Net(#[from] NetError),

    #[error("unexpected payload from {url}: {reason}")]
    Payload { url: String, reason: String },

    #[error("no URL in upstream reply")]
    Empty,
}

/// A strategy that turns a candidate into a concrete URL, typically by
/// calling a mirror API. Implementations must be safe to call concurrently.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    async fn resolve(&self, ctx: &RequestContext) -> Result<String, ResolveError>;
}

/// Resolver for candidates whose URL was already present in the search
/// payload.
pub struct FixedUrl(pub String);

#[async_trait]
impl UrlResolver for FixedUrl {
    async fn resolve(&self, _ctx: &RequestContext) -> Result<String, ResolveError> {
        if self.0.starts_with("http") {
            Ok(self.0.clone())
        } else {
            Err(ResolveError::Empty)
        }
    }
}

/// One ranked quality variant of a media item, local to one resolution
/// attempt. Candidates are evaluated highest-quality first.
pub struct Candidate {
    pub tier: QualityTier,
    /// Marks a strategy that should win ties against a larger rival — used
    /// for sources where a slower lossless path beats a fast lossy one.
    pub pinned: bool,
    pub resolver: Arc<dyn UrlResolver>,
    /// Extension declared upstream; unreliable, corrected by the probe.
    pub declared_ext: Option<String>,
    /// Size declared upstream; unreliable, corrected by the probe.
    pub declared_size: Option<u64>,
}

impl Candidate {
    pub fn new(tier: QualityTier, resolver: Arc<dyn UrlResolver>) -> Self {
        Self {
            tier,
            pinned: false,
            resolver,
            declared_ext: None,
            declared_size: None,
        }
    }

    pub fn fixed(tier: QualityTier, url: impl Into<String>) -> Self {
        Self::new(tier, Arc::new(FixedUrl(url.into())))
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn with_declared_ext(mut self, ext: impl Into<String>) -> Self {
        self.declared_ext = Some(ext.into());
        self
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("tier", &self.tier)
            .field("pinned", &self.pinned)
            .field("declared_ext", &self.declared_ext)
            .field("declared_size", &self.declared_size)
            .finish()
    }
}

/// A candidate that made it through validation.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    pub url: String,
    pub ext: Option<String>,
    pub size_bytes: Option<u64>,
    pub tier: QualityTier,
    pub pinned: bool,
    pub validation: ValidationResult,
}

impl ResolvedLink {
    /// Pick between two winning resolutions for the same logical item: a
    /// pinned strategy beats an unpinned one, otherwise the larger probed
    /// size wins. Ties keep `self`.
    pub fn prefer(self, other: ResolvedLink) -> ResolvedLink {
        if self.pinned != other.pinned {
            return if self.pinned { self } else { other };
        }
        if other.size_bytes.unwrap_or(0) > self.size_bytes.unwrap_or(0) {
            other
        } else {
            self
        }
    }
}

/// Outcome of evaluating a candidate chain. Exhaustion is a value, not an
/// error; callers drop unresolved items silently.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(ResolvedLink),
    Unresolved,
}

impl Resolution {
    pub fn resolved(self) -> Option<ResolvedLink> {
        match self {
            Resolution::Resolved(link) => Some(link),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}
