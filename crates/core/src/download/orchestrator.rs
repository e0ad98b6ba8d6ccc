//! Per-source pooled streaming downloads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::fsutil::collision_free_path;
use crate::net::{HttpClient, RequestContext};
use crate::source::{MediaRecord, RecordPayload};

use super::types::{
    DownloadConfig, DownloadError, DownloadFailure, DownloadObserver, DownloadOutcome,
    DownloadedRecord, EnrichmentHook, NoopEnrichment, NoopObserver, DOWNLOAD_SNAPSHOT_FILE,
};

/// State shared by all download tasks of one run, behind the orchestrator's
/// own lock (distinct from any search-side lock). Path reservations live
/// here so two concurrent items can never pick the same destination.
#[derive(Default)]
struct Shared {
    completed: Vec<DownloadedRecord>,
    failures: Vec<DownloadFailure>,
    reserved: HashSet<PathBuf>,
}

/// Downloads resolved records, one bounded worker pool per source.
pub struct DownloadOrchestrator {
    http: HttpClient,
    config: DownloadConfig,
    observer: Arc<dyn DownloadObserver>,
    hook: Arc<dyn EnrichmentHook>,
}

impl DownloadOrchestrator {
    pub fn new(http: HttpClient, config: DownloadConfig) -> Self {
        Self {
            http,
            config,
            observer: Arc::new(NoopObserver),
            hook: Arc::new(NoopEnrichment),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DownloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn EnrichmentHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Download every leaf among `records` into `dest_dir`.
    ///
    /// Composites are flattened to their children first. Sources proceed
    /// concurrently, each behind its own worker bound; a failed item is
    /// logged and reported but never stops its siblings.
    pub async fn download(
        &self,
        records: Vec<MediaRecord>,
        dest_dir: &Path,
        ctx: &RequestContext,
    ) -> DownloadOutcome {
        let leaves = flatten_leaves(records);
        if leaves.is_empty() {
            return DownloadOutcome::default();
        }

        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            warn!(dir = %dest_dir.display(), error = %e, "cannot create download directory");
            return DownloadOutcome {
                completed: Vec::new(),
                failures: leaves
                    .into_iter()
                    .map(|record| DownloadFailure {
                        source: record.source.clone(),
                        identifier: record.identifier.clone(),
                        title: record.title.clone(),
                        error: e.to_string(),
                    })
                    .collect(),
            };
        }

        info!(items = leaves.len(), dir = %dest_dir.display(), "starting downloads");
        let shared = Arc::new(Mutex::new(Shared::default()));

        // One semaphore per source, mirroring the search fan-out.
        let mut pools: Vec<(String, Arc<Semaphore>)> = Vec::new();
        let mut tasks = Vec::new();
        for (id, record) in leaves.into_iter().enumerate() {
            let pool = match pools.iter().find(|(source, _)| *source == record.source) {
                Some((_, pool)) => Arc::clone(pool),
                None => {
                    let pool = Arc::new(Semaphore::new(self.config.workers_for(&record.source)));
                    pools.push((record.source.clone(), Arc::clone(&pool)));
                    pool
                }
            };

            let http = self.http.clone();
            let shared = Arc::clone(&shared);
            let observer = Arc::clone(&self.observer);
            let hook = Arc::clone(&self.hook);
            let ctx = ctx.clone();
            let dest_dir = dest_dir.to_path_buf();

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return;
                };
                download_one(http, shared, observer, hook, id, record, &dest_dir, &ctx).await;
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "download task panicked");
            }
        }

        let (completed, failures) = {
            let mut shared = shared.lock().expect("download lock poisoned");
            (
                std::mem::take(&mut shared.completed),
                std::mem::take(&mut shared.failures),
            )
        };

        if !completed.is_empty() {
            write_download_snapshot(dest_dir, &completed).await;
        }
        info!(
            completed = completed.len(),
            failed = failures.len(),
            "downloads finished"
        );

        DownloadOutcome { completed, failures }
    }
}

/// Replace composites by their children, recursively, keeping leaf order.
fn flatten_leaves(records: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut out = Vec::new();
    for record in records {
        match record.payload {
            RecordPayload::Composite { children } => out.extend(flatten_leaves(children)),
            RecordPayload::Leaf { .. } => out.push(record),
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
async fn download_one(
    http: HttpClient,
    shared: Arc<Mutex<Shared>>,
    observer: Arc<dyn DownloadObserver>,
    hook: Arc<dyn EnrichmentHook>,
    id: usize,
    record: MediaRecord,
    dest_dir: &Path,
    ctx: &RequestContext,
) {
    match transfer(&http, &shared, observer.as_ref(), id, &record, dest_dir, ctx).await {
        Ok((path, bytes_written)) => {
            // Enrichment is best-effort; a failing hook never fails the item.
            let record = match hook.enrich(&path, &record).await {
                Ok(enriched) => enriched,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "enrichment hook failed");
                    record
                }
            };

            if let RecordPayload::Leaf {
                scratch_dir: Some(scratch),
                ..
            } = &record.payload
            {
                if let Err(e) = tokio::fs::remove_dir_all(scratch).await {
                    debug!(dir = %scratch.display(), error = %e, "scratch dir cleanup failed");
                }
            }

            observer.completed(id, &path);
            let mut shared = shared.lock().expect("download lock poisoned");
            shared.completed.push(DownloadedRecord {
                record,
                path,
                bytes_written,
            });
        }
        Err(e) => {
            warn!(
                source = %record.source,
                identifier = %record.identifier,
                error = %e,
                "download failed"
            );
            observer.failed(id, &e);
            let mut shared = shared.lock().expect("download lock poisoned");
            shared.failures.push(DownloadFailure {
                source: record.source.clone(),
                identifier: record.identifier.clone(),
                title: record.title.clone(),
                error: e.to_string(),
            });
        }
    }
}

/// Stream one record to disk, returning the destination and byte count.
async fn transfer(
    http: &HttpClient,
    shared: &Mutex<Shared>,
    observer: &dyn DownloadObserver,
    id: usize,
    record: &MediaRecord,
    dest_dir: &Path,
    ctx: &RequestContext,
) -> Result<(PathBuf, u64), DownloadError> {
    let RecordPayload::Leaf {
        url,
        ext,
        size_bytes,
        download_headers,
        ..
    } = &record.payload
    else {
        return Err(DownloadError::NotDownloadable);
    };

    // Reserve a collision-free destination under the run lock.
    let path = {
        let mut shared = shared.lock().expect("download lock poisoned");
        let stem = format!("{} - {}", record.title, record.identifier);
        let path = collision_free_path(dest_dir, &stem, ext, |p| shared.reserved.contains(p));
        shared.reserved.insert(path.clone());
        path
    };

    let ctx = ctx.clone().with_headers(download_headers.clone());
    let resp = http.get(url, &ctx).await?;

    // Content-Length when the server sends one, the probed size as a hint
    // otherwise; re-based to the true count once the stream ends.
    let mut total = resp.content_length().or(*size_bytes);
    observer.started(id, record, total);

    let result = async {
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Transfer {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            observer.advanced(id, written, total);
        }
        file.flush().await?;
        Ok::<u64, DownloadError>(written)
    }
    .await;

    let written = match result {
        Ok(written) => written,
        Err(e) => {
            // Leave no partial file behind.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
    };

    if total != Some(written) {
        total = Some(written);
        observer.rebased(id, written);
    }
    debug!(
        path = %path.display(),
        bytes = written,
        total = ?total,
        "item written"
    );

    Ok((path, written))
}

/// Persist the completed list next to the files; failures only get logged.
async fn write_download_snapshot(dest_dir: &Path, completed: &[DownloadedRecord]) {
    let path = dest_dir.join(DOWNLOAD_SNAPSHOT_FILE);
    match serde_json::to_vec_pretty(completed) {
        Ok(json) => {
            if let Err(e) = tokio::fs::write(&path, json).await {
                warn!(path = %path.display(), error = %e, "failed to write download snapshot");
            } else {
                info!(path = %path.display(), "download snapshot written");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize download snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::net::HttpPolicy;
    use crate::testing::fixtures;

    use super::*;

    fn orchestrator() -> DownloadOrchestrator {
        let http = HttpClient::new(HttpPolicy {
            max_retries: 1,
            ..HttpPolicy::default()
        })
        .unwrap();
        DownloadOrchestrator::new(http, DownloadConfig::default())
    }

    /// Observer asserting bytes only ever grow.
    struct MonotonicObserver {
        violated: Arc<AtomicBool>,
        last: Mutex<u64>,
    }

    impl DownloadObserver for MonotonicObserver {
        fn advanced(&self, _id: usize, bytes_done: u64, _total: Option<u64>) {
            let mut last = self.last.lock().unwrap();
            if bytes_done < *last {
                self.violated.store(true, Ordering::SeqCst);
            }
            *last = bytes_done;
        }
    }

    #[tokio::test]
    async fn test_streamed_file_is_byte_exact() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        Mock::given(method("GET"))
            .and(url_path("/file.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let record =
            fixtures::leaf_record_with_url("a", "a:1", "Track", &format!("{}/file.mp3", server.uri()));

        let tmp = tempfile::tempdir().unwrap();
        let violated = Arc::new(AtomicBool::new(false));
        let observer = Arc::new(MonotonicObserver {
            violated: Arc::clone(&violated),
            last: Mutex::new(0),
        });

        let outcome = orchestrator()
            .with_observer(observer)
            .download(vec![record], tmp.path(), &RequestContext::new())
            .await;

        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].bytes_written, body.len() as u64);
        let on_disk = std::fs::read(&outcome.completed[0].path).unwrap();
        assert_eq!(on_disk, body);
        assert!(!violated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_siblings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/good.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 good".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/bad.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let records = vec![
            fixtures::leaf_record_with_url("a", "a:good", "Good", &format!("{}/good.mp3", server.uri())),
            fixtures::leaf_record_with_url("a", "a:bad", "Bad", &format!("{}/bad.mp3", server.uri())),
        ];

        let tmp = tempfile::tempdir().unwrap();
        let outcome = orchestrator()
            .download(records, tmp.path(), &RequestContext::new())
            .await;

        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].record.identifier, "a:good");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].identifier, "a:bad");
    }

    #[tokio::test]
    async fn test_same_title_items_get_distinct_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 data".to_vec()))
            .mount(&server)
            .await;

        // Same title and identifier → same preferred file name.
        let records: Vec<MediaRecord> = (0..4)
            .map(|_| {
                fixtures::leaf_record_with_url("a", "a:1", "Same", &format!("{}/x.mp3", server.uri()))
            })
            .collect();

        let tmp = tempfile::tempdir().unwrap();
        let outcome = orchestrator()
            .download(records, tmp.path(), &RequestContext::new())
            .await;

        assert_eq!(outcome.completed.len(), 4);
        let mut paths: Vec<&PathBuf> = outcome.completed.iter().map(|c| &c.path).collect();
        let before = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), before);
    }

    #[tokio::test]
    async fn test_composites_are_flattened() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 ep".to_vec()))
            .mount(&server)
            .await;

        let children = vec![
            fixtures::leaf_record_with_url("a", "a:ep1", "Episode 1", &format!("{}/1.mp3", server.uri())),
            fixtures::leaf_record_with_url("a", "a:ep2", "Episode 2", &format!("{}/2.mp3", server.uri())),
        ];
        let composite = MediaRecord::composite("a", "a:series", "Series", children);

        let tmp = tempfile::tempdir().unwrap();
        let outcome = orchestrator()
            .download(vec![composite], tmp.path(), &RequestContext::new())
            .await;

        assert_eq!(outcome.completed.len(), 2);
    }

    #[tokio::test]
    async fn test_download_snapshot_written() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 x".to_vec()))
            .mount(&server)
            .await;

        let record =
            fixtures::leaf_record_with_url("a", "a:1", "One", &format!("{}/1.mp3", server.uri()));
        let tmp = tempfile::tempdir().unwrap();
        orchestrator()
            .download(vec![record], tmp.path(), &RequestContext::new())
            .await;

        let snapshot = tmp.path().join(DOWNLOAD_SNAPSHOT_FILE);
        assert!(snapshot.is_file());
        let parsed: Vec<DownloadedRecord> =
            serde_json::from_slice(&std::fs::read(snapshot).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[tokio::test]
    async fn test_enrichment_failure_is_swallowed() {
        struct FailingHook;

        #[async_trait::async_trait]
        impl EnrichmentHook for FailingHook {
            async fn enrich(
                &self,
                _path: &Path,
                _record: &MediaRecord,
            ) -> anyhow::Result<MediaRecord> {
                anyhow::bail!("tag writer exploded")
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 x".to_vec()))
            .mount(&server)
            .await;

        let record =
            fixtures::leaf_record_with_url("a", "a:1", "One", &format!("{}/1.mp3", server.uri()));
        let tmp = tempfile::tempdir().unwrap();
        let outcome = orchestrator()
            .with_hook(Arc::new(FailingHook))
            .download(vec![record], tmp.path(), &RequestContext::new())
            .await;

        // Still a success; the hook is best-effort.
        assert_eq!(outcome.completed.len(), 1);
        assert!(outcome.failures.is_empty());
    }
}
