//! Multi-source search orchestration.
//!
//! One run fans a keyword out across every configured adapter on a bounded
//! two-level worker pool, aggregates with per-task failure isolation,
//! deduplicates the fan-in result, and leaves a JSON snapshot behind for
//! diagnostics. A run that finds nothing is not an error; a run where some
//! sources broke is not an error either — failures live in the outcome and
//! the logs, never in a Result.

mod dedup;
mod orchestrator;
mod progress;
mod snapshot;
mod types;

pub use dedup::dedupe;
pub use orchestrator::SearchOrchestrator;
pub use progress::{Counter, ProgressListener, ProgressSnapshot, SearchProgress};
pub use snapshot::{create_run_dir, write_report, RunReport, SEARCH_SNAPSHOT_FILE};
pub use types::{RunPhase, SearchOutcome, SearchRunConfig, TaskFailure};
