use super::{types::Config, ConfigError};

/// Validate configuration beyond what deserialization enforces.
///
/// `known_sources` is the set of registered adapter names; a configured
/// source outside that set is a fatal startup error, not something to retry
/// around at run time.
pub fn validate_config(config: &Config, known_sources: &[&str]) -> Result<(), ConfigError> {
    for name in config.sources.keys() {
        if !known_sources.contains(&name.as_str()) {
            return Err(ConfigError::UnknownSource(name.clone()));
        }
    }

    if config.run.adapter_fanout == 0 {
        return Err(ConfigError::ValidationError(
            "run.adapter_fanout must be at least 1".to_string(),
        ));
    }

    if config.run.search_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "run.search_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.network.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "network.request_timeout_secs must be at least 1".to_string(),
        ));
    }

    for (name, settings) in &config.sources {
        if settings.workers == 0 {
            return Err(ConfigError::ValidationError(format!(
                "sources.{name}.workers must be at least 1"
            )));
        }
    }

    Ok(())
}
