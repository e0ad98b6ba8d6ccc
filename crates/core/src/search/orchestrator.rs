//! Fan-out/fan-in search orchestration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::net::RequestContext;
use crate::source::{AdapterRegistry, MediaRecord};

use super::dedup::dedupe;
use super::progress::SearchProgress;
use super::snapshot::{create_run_dir, write_report, RunReport, SEARCH_SNAPSHOT_FILE};
use super::types::{RunPhase, SearchOutcome, SearchRunConfig, TaskFailure};

/// Guarded aggregation point for fan-in.
///
/// Every (source, page) task gets its own slot, so one adapter's output can
/// be reassembled in query order afterwards. Once the run closes the
/// aggregate — normal completion or timeout — a late task's hand-off is
/// discarded: abandoned tasks finish in place but contribute nothing.
#[derive(Default)]
struct Aggregate {
    state: Mutex<AggregateState>,
}

#[derive(Default)]
struct AggregateState {
    slots: HashMap<(String, u32), Vec<MediaRecord>>,
    failures: Vec<TaskFailure>,
    closed: bool,
}

impl Aggregate {
    /// Hand a completed task's records in. Returns false when the run is
    /// already closed and the records were dropped.
    fn push_records(&self, source: &str, page_index: u32, records: Vec<MediaRecord>) -> bool {
        let mut state = self.state.lock().expect("aggregate lock poisoned");
        if state.closed {
            return false;
        }
        state
            .slots
            .insert((source.to_string(), page_index), records);
        true
    }

    fn push_failure(&self, failure: TaskFailure) {
        let mut state = self.state.lock().expect("aggregate lock poisoned");
        if !state.closed {
            state.failures.push(failure);
        }
    }

    fn close_and_take(&self) -> (HashMap<(String, u32), Vec<MediaRecord>>, Vec<TaskFailure>) {
        let mut state = self.state.lock().expect("aggregate lock poisoned");
        state.closed = true;
        (
            std::mem::take(&mut state.slots),
            std::mem::take(&mut state.failures),
        )
    }
}

/// Fans a keyword out over every registered adapter and collects the
/// surviving records.
///
/// Two nested bounded pools: a run-wide adapter fanout bound, and a
/// per-adapter query pool. Every task runs inside a failure boundary — an
/// adapter error, panic, or timeout costs exactly that task's records and
/// nothing else.
pub struct SearchOrchestrator {
    registry: AdapterRegistry,
    config: SearchRunConfig,
    progress: Arc<SearchProgress>,
    phase: Mutex<RunPhase>,
}

impl SearchOrchestrator {
    pub fn new(registry: AdapterRegistry, config: SearchRunConfig) -> Self {
        Self {
            registry,
            config,
            progress: Arc::new(SearchProgress::new()),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// The run's progress counters, for attaching a UI listener.
    pub fn progress(&self) -> Arc<SearchProgress> {
        Arc::clone(&self.progress)
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().expect("phase lock poisoned")
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock().expect("phase lock poisoned") = phase;
    }

    /// Run one search. Never fails: broken sources surface in
    /// `SearchOutcome::failures`, an empty result set is a normal outcome.
    pub async fn run(&self, keyword: &str, ctx: &RequestContext) -> SearchOutcome {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let started_at = Utc::now();
        info!(
            %run_id,
            keyword,
            sources = self.registry.len(),
            "starting search run"
        );

        self.set_phase(RunPhase::FanningOut);
        let aggregate = Arc::new(Aggregate::default());
        let adapter_sem = Arc::new(Semaphore::new(self.config.adapter_fanout.max(1)));

        let mut drivers = Vec::new();
        for adapter in self.registry.adapters() {
            let adapter = Arc::clone(adapter);
            let aggregate = Arc::clone(&aggregate);
            let adapter_sem = Arc::clone(&adapter_sem);
            let progress = Arc::clone(&self.progress);
            let ctx = ctx.clone();
            let keyword = keyword.to_string();
            let workers = self.config.workers_for(adapter.name());

            drivers.push(tokio::spawn(async move {
                let Ok(_fanout_permit) = adapter_sem.acquire_owned().await else {
                    return;
                };

                let queries = match adapter.build_queries(&keyword, &ctx).await {
                    Ok(queries) => queries,
                    Err(e) => {
                        warn!(source = adapter.name(), error = %e, "query planning failed");
                        aggregate.push_failure(TaskFailure {
                            source: adapter.name().to_string(),
                            page_index: None,
                            error: e.to_string(),
                        });
                        return;
                    }
                };
                if queries.is_empty() {
                    return;
                }
                progress.add_tasks(adapter.name(), queries.len());

                let query_sem = Arc::new(Semaphore::new(workers));
                let mut tasks = Vec::new();
                for query in queries {
                    let adapter = Arc::clone(&adapter);
                    let aggregate = Arc::clone(&aggregate);
                    let query_sem = Arc::clone(&query_sem);
                    let progress = Arc::clone(&progress);
                    let ctx = ctx.clone();

                    tasks.push(tokio::spawn(async move {
                        let Ok(_query_permit) = query_sem.acquire_owned().await else {
                            return;
                        };

                        match adapter.execute_query(&query, &ctx).await {
                            Ok(records) => {
                                debug!(
                                    source = %query.source,
                                    page = query.page_index,
                                    records = records.len(),
                                    "search task complete"
                                );
                                if !aggregate.push_records(&query.source, query.page_index, records)
                                {
                                    debug!(
                                        source = %query.source,
                                        page = query.page_index,
                                        "run already closed, result discarded"
                                    );
                                }
                            }
                            Err(e) => {
                                warn!(
                                    source = %query.source,
                                    page = query.page_index,
                                    url = %query.url,
                                    error = %e,
                                    "search task failed"
                                );
                                aggregate.push_failure(TaskFailure {
                                    source: query.source.clone(),
                                    page_index: Some(query.page_index),
                                    error: e.to_string(),
                                });
                            }
                        }
                        progress.task_completed(&query.source);
                    }));
                }

                for task in tasks {
                    if let Err(e) = task.await {
                        warn!(source = adapter.name(), error = %e, "search task panicked");
                        aggregate.push_failure(TaskFailure {
                            source: adapter.name().to_string(),
                            page_index: None,
                            error: e.to_string(),
                        });
                    }
                }
            }));
        }

        self.set_phase(RunPhase::Aggregating);
        let wait = futures::future::join_all(drivers);
        if tokio::time::timeout(self.config.run_timeout, wait)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.run_timeout.as_secs(),
                "search run timed out; in-flight tasks abandoned in place"
            );
        }

        let (slots, failures) = aggregate.close_and_take();

        // Reassemble: within one adapter, pages in query order; across
        // adapters, registration order (callers get no cross-adapter
        // guarantee).
        let mut by_source: HashMap<String, Vec<(u32, Vec<MediaRecord>)>> = HashMap::new();
        for ((source, page_index), records) in slots {
            by_source.entry(source).or_default().push((page_index, records));
        }
        let mut records = Vec::new();
        for adapter in self.registry.adapters() {
            if let Some(mut pages) = by_source.remove(adapter.name()) {
                pages.sort_by_key(|(page_index, _)| *page_index);
                for (_, page_records) in pages {
                    records.extend(page_records);
                }
            }
        }

        self.set_phase(RunPhase::Deduplicating);
        let found = records.len();
        let records = dedupe(records);
        debug!(found, kept = records.len(), "deduplicated fan-in results");

        let duration_ms = started.elapsed().as_millis() as u64;
        let work_dir = self
            .write_snapshot(run_id, keyword, started_at, duration_ms, &records, &failures)
            .await;

        self.set_phase(RunPhase::Done);
        info!(
            %run_id,
            records = records.len(),
            failures = failures.len(),
            duration_ms,
            "search run complete"
        );

        SearchOutcome {
            run_id,
            keyword: keyword.to_string(),
            records,
            failures,
            duration_ms,
            work_dir,
        }
    }

    /// Persist the run snapshot; failures are logged, never fatal, and an
    /// empty run leaves no directory behind.
    async fn write_snapshot(
        &self,
        run_id: Uuid,
        keyword: &str,
        started_at: chrono::DateTime<Utc>,
        duration_ms: u64,
        records: &[MediaRecord],
        failures: &[TaskFailure],
    ) -> Option<std::path::PathBuf> {
        if records.is_empty() {
            return None;
        }

        let dir = match create_run_dir(&self.config.work_dir, keyword).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "failed to create run directory");
                return None;
            }
        };

        let report = RunReport {
            run_id,
            keyword: keyword.to_string(),
            started_at,
            duration_ms,
            failures: failures.to_vec(),
            records: records.to_vec(),
        };
        match write_report(&dir, SEARCH_SNAPSHOT_FILE, &report).await {
            Ok(path) => {
                info!(path = %path.display(), "search snapshot written");
                Some(dir)
            }
            Err(e) => {
                warn!(error = %e, "failed to write search snapshot");
                Some(dir)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::testing::{fixtures, MockAdapter};

    use super::*;

    fn run_config(dir: &std::path::Path) -> SearchRunConfig {
        SearchRunConfig {
            work_dir: dir.to_path_buf(),
            ..SearchRunConfig::default()
        }
    }

    #[tokio::test]
    async fn test_single_adapter_run() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MockAdapter::new("alpha").with_records(vec![
            fixtures::leaf_record("alpha", "alpha:1", "One"),
            fixtures::leaf_record("alpha", "alpha:2", "Two"),
        ]);
        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(adapter)]),
            run_config(tmp.path()),
        );

        let outcome = orchestrator.run("anything", &RequestContext::new()).await;
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.failures.is_empty());
        assert_eq!(orchestrator.phase(), RunPhase::Done);
    }

    #[tokio::test]
    async fn test_failing_adapter_does_not_poison_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let broken = MockAdapter::new("broken").failing_queries();
        let healthy = MockAdapter::new("healthy").with_records(vec![
            fixtures::leaf_record("healthy", "healthy:1", "A"),
            fixtures::leaf_record("healthy", "healthy:2", "B"),
            fixtures::leaf_record("healthy", "healthy:3", "C"),
        ]);

        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(broken), Arc::new(healthy)]),
            run_config(tmp.path()),
        );

        let outcome = orchestrator.run("x", &RequestContext::new()).await;
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].source, "broken");
    }

    #[tokio::test]
    async fn test_order_preserved_within_adapter() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MockAdapter::new("paged")
            .with_pages(vec![
                vec![fixtures::leaf_record("paged", "paged:p0", "Page zero")],
                vec![fixtures::leaf_record("paged", "paged:p1", "Page one")],
                vec![fixtures::leaf_record("paged", "paged:p2", "Page two")],
            ])
            .with_page_delays(vec![30, 0, 10]);

        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(adapter)]),
            run_config(tmp.path()),
        );

        let outcome = orchestrator.run("x", &RequestContext::new()).await;
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.identifier.as_str()).collect();
        // Completion order was scrambled by the delays; output order is not.
        assert_eq!(ids, vec!["paged:p0", "paged:p1", "paged:p2"]);
    }

    #[tokio::test]
    async fn test_timed_out_tasks_contribute_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let slow = MockAdapter::new("slow")
            .with_records(vec![fixtures::leaf_record("slow", "slow:1", "Late")])
            .with_page_delays(vec![10_000]);
        let fast = MockAdapter::new("fast")
            .with_records(vec![fixtures::leaf_record("fast", "fast:1", "On time")]);

        let mut config = run_config(tmp.path());
        config.run_timeout = Duration::from_millis(300);

        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(slow), Arc::new(fast)]),
            config,
        );

        let outcome = orchestrator.run("x", &RequestContext::new()).await;
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["fast:1"]);
    }

    #[tokio::test]
    async fn test_empty_run_writes_no_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MockAdapter::new("empty");
        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(adapter)]),
            run_config(tmp.path()),
        );

        let outcome = orchestrator.run("nothing", &RequestContext::new()).await;
        assert!(outcome.records.is_empty());
        assert!(outcome.work_dir.is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_written_for_non_empty_run() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MockAdapter::new("alpha")
            .with_records(vec![fixtures::leaf_record("alpha", "alpha:1", "One")]);
        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(adapter)]),
            run_config(tmp.path()),
        );

        let outcome = orchestrator.run("tempest", &RequestContext::new()).await;
        let dir = outcome.work_dir.expect("snapshot dir");
        let snapshot = dir.join(SEARCH_SNAPSHOT_FILE);
        assert!(snapshot.is_file());

        let report: RunReport =
            serde_json::from_slice(&std::fs::read(snapshot).unwrap()).unwrap();
        assert_eq!(report.keyword, "tempest");
        assert_eq!(report.records.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_adapter_duplicates_collapse() {
        let tmp = tempfile::tempdir().unwrap();
        let first = MockAdapter::new("first")
            .with_records(vec![fixtures::leaf_record("first", "src:123", "From first")]);
        let second = MockAdapter::new("second")
            .with_records(vec![fixtures::leaf_record("second", "src:123", "From second")]);

        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(first), Arc::new(second)]),
            run_config(tmp.path()),
        );

        let outcome = orchestrator.run("x", &RequestContext::new()).await;
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].identifier, "src:123");
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MockAdapter::new("alpha").with_pages(vec![
            vec![fixtures::leaf_record("alpha", "alpha:1", "One")],
            vec![fixtures::leaf_record("alpha", "alpha:2", "Two")],
        ]);
        let orchestrator = SearchOrchestrator::new(
            AdapterRegistry::from_adapters(vec![Arc::new(adapter)]),
            run_config(tmp.path()),
        );

        orchestrator.run("x", &RequestContext::new()).await;
        let snap = orchestrator.progress().snapshot();
        assert_eq!(snap.overall.completed, 2);
        assert_eq!(snap.overall.total, 2);
    }
}
