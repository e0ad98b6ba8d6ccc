//! Hierarchical search progress tracking.
//!
//! Two levels: one counter per source, one overall counter across sources.
//! Both advance under a single mutex so a listener can never observe a torn
//! update (source done without the overall moving, or vice versa).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Completed/total pair for one progress line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub completed: usize,
    pub total: usize,
}

/// Consistent view of all counters, taken under the lock.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub per_source: BTreeMap<String, Counter>,
    pub overall: Counter,
}

pub type ProgressListener = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Lock-guarded progress counters for one search run.
#[derive(Default)]
pub struct SearchProgress {
    state: Mutex<ProgressSnapshot>,
    listener: Mutex<Option<ProgressListener>>,
}

impl SearchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener; it is called with a snapshot after every update,
    /// outside the counter lock.
    pub fn set_listener(&self, listener: ProgressListener) {
        *self.listener.lock().expect("progress listener lock poisoned") = Some(listener);
    }

    /// Announce `n` new tasks for a source, growing both counters' totals.
    pub fn add_tasks(&self, source: &str, n: usize) {
        let snapshot = {
            let mut state = self.state.lock().expect("progress lock poisoned");
            let counter = state.per_source.entry(source.to_string()).or_default();
            counter.total += n;
            state.overall.total += n;
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Record one finished task; the source counter and the overall counter
    /// advance under the same lock.
    pub fn task_completed(&self, source: &str) {
        let snapshot = {
            let mut state = self.state.lock().expect("progress lock poisoned");
            let counter = state.per_source.entry(source.to_string()).or_default();
            counter.completed += 1;
            state.overall.completed += 1;
            state.clone()
        };
        self.notify(&snapshot);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().expect("progress lock poisoned").clone()
    }

    fn notify(&self, snapshot: &ProgressSnapshot) {
        let listener = self
            .listener
            .lock()
            .expect("progress listener lock poisoned")
            .clone();
        if let Some(listener) = listener {
            listener(snapshot);
        }
    }
}
