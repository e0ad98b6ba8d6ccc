mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::{Config, NetworkConfig, RunConfig, SourceSettings};
pub use validate::validate_config;

use thiserror::Error;

/// Malformed run configuration. The only error class that terminates a run;
/// raised at startup, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
