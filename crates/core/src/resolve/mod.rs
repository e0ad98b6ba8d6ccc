//! Ranked quality-fallback resolution.
//!
//! A located item usually comes with several quality variants (lossless
//! mirror, high-bitrate stream, plain mp3), each behind its own resolution
//! strategy, and most of them dead at any given moment. The
//! [`QualityChain`] walks the ranked candidates, keeps the first one whose
//! URL actually answers, corrects its metadata with a probe, and stops.

mod chain;
mod types;

pub use chain::QualityChain;
pub use types::{
    Candidate, FixedUrl, QualityTier, ResolveError, ResolvedLink, Resolution, UrlResolver,
};
