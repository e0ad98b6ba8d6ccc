//! Source adapter abstraction.
//!
//! Every upstream platform is wrapped in a [`SourceAdapter`]: `build_queries`
//! plans the pages to fetch for a keyword, `execute_query` runs one page and
//! returns fully resolved records. Adapters are registered in a static table
//! and instantiated from configuration at startup.

mod jamendo;
mod registry;
mod tunehub;
mod types;

pub use jamendo::JamendoAdapter;
pub use registry::{known_source_names, AdapterContext, AdapterRegistry, DEFAULT_SOURCES};
pub use tunehub::TuneHubAdapter;
pub use types::{MediaQuery, MediaRecord, RecordPayload, SourceAdapter, SourceError};
