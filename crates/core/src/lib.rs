pub mod config;
pub mod download;
pub mod fsutil;
pub mod net;
pub mod resolve;
pub mod search;
pub mod source;
pub mod testing;
pub mod validator;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use download::{
    DownloadConfig, DownloadError, DownloadObserver, DownloadOrchestrator, DownloadOutcome,
    DownloadedRecord, EnrichmentHook,
};
pub use net::{HttpClient, HttpPolicy, NetError, RequestContext, SessionMode};
pub use resolve::{Candidate, QualityChain, QualityTier, Resolution, ResolvedLink, UrlResolver};
pub use search::{
    dedupe, RunPhase, SearchOrchestrator, SearchOutcome, SearchProgress, SearchRunConfig,
};
pub use source::{
    known_source_names, AdapterRegistry, MediaQuery, MediaRecord, RecordPayload, SourceAdapter,
    SourceError, DEFAULT_SOURCES,
};
pub use validator::{LinkValidator, ProbeReport, ValidationResult};
