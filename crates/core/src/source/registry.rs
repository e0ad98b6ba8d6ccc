//! Static adapter registry.
//!
//! Adapters are registered in a fixed name → constructor table at compile
//! time and instantiated at startup from configuration. Asking for a name
//! outside the table is a fatal configuration error.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ConfigError, SourceSettings};
use crate::net::HttpClient;
use crate::resolve::QualityChain;

use super::jamendo::JamendoAdapter;
use super::tunehub::TuneHubAdapter;
use super::types::SourceAdapter;

/// Everything an adapter needs at construction time.
#[derive(Clone)]
pub struct AdapterContext {
    pub settings: SourceSettings,
    pub http: HttpClient,
    pub chain: QualityChain,
}

type AdapterFactory = fn(AdapterContext) -> Arc<dyn SourceAdapter>;

fn make_jamendo(ctx: AdapterContext) -> Arc<dyn SourceAdapter> {
    Arc::new(JamendoAdapter::new(ctx))
}

fn make_tunehub(ctx: AdapterContext) -> Arc<dyn SourceAdapter> {
    Arc::new(TuneHubAdapter::new(ctx))
}

const BUILTIN: &[(&str, AdapterFactory)] = &[
    ("jamendo", make_jamendo),
    ("tunehub", make_tunehub),
];

/// Sources used when the caller does not name any.
pub const DEFAULT_SOURCES: &[&str] = &["jamendo", "tunehub"];

/// Names of every registered adapter, for config validation and `--help`.
pub fn known_source_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}

/// The set of adapters taking part in one run.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field(
                "adapters",
                &self.adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AdapterRegistry {
    /// Instantiate the named adapters with their per-source settings.
    ///
    /// Unknown names fail immediately; disabled sources are skipped.
    pub fn build(
        names: &[String],
        sources: &BTreeMap<String, SourceSettings>,
        http: &HttpClient,
        chain: &QualityChain,
    ) -> Result<Self, ConfigError> {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

        for name in names {
            let factory = BUILTIN
                .iter()
                .find(|(registered, _)| *registered == name.as_str())
                .map(|(_, factory)| factory)
                .ok_or_else(|| ConfigError::UnknownSource(name.clone()))?;

            let settings = sources.get(name).cloned().unwrap_or_default();
            if !settings.enabled {
                continue;
            }

            adapters.push(factory(AdapterContext {
                settings,
                http: http.clone(),
                chain: chain.clone(),
            }));
        }

        Ok(Self { adapters })
    }

    /// Wrap pre-built adapters; used by tests and embedders.
    pub fn from_adapters(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
