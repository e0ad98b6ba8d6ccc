//! Terminal progress rendering on top of the engine's progress callbacks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crescendo_core::search::{ProgressListener, ProgressSnapshot};
use crescendo_core::source::MediaRecord;
use crescendo_core::download::{DownloadError, DownloadObserver};

const SEARCH_TEMPLATE: &str = "{prefix:>12} {wide_bar:.cyan/blue} {pos}/{len}";
const DOWNLOAD_TEMPLATE: &str =
    "{prefix:>12} {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";
const DOWNLOAD_SPINNER_TEMPLATE: &str =
    "{prefix:>12} {spinner:.blue} {bytes} ({bytes_per_sec}) {msg}";

fn search_style() -> ProgressStyle {
    ProgressStyle::with_template(SEARCH_TEMPLATE).expect("valid progress template")
}

/// One bar per source plus an overall bar, fed by the search progress
/// listener.
pub struct SearchBars {
    multi: MultiProgress,
    overall: ProgressBar,
    per_source: Mutex<HashMap<String, ProgressBar>>,
}

impl SearchBars {
    pub fn new() -> Arc<Self> {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(search_style());
        overall.set_prefix("all sources");
        Arc::new(Self {
            multi,
            overall,
            per_source: Mutex::new(HashMap::new()),
        })
    }

    pub fn listener(self: Arc<Self>) -> ProgressListener {
        Arc::new(move |snapshot: &ProgressSnapshot| self.render(snapshot))
    }

    fn render(&self, snapshot: &ProgressSnapshot) {
        let mut per_source = self.per_source.lock().expect("bar map lock poisoned");
        for (source, counter) in &snapshot.per_source {
            let bar = per_source.entry(source.clone()).or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(counter.total as u64));
                bar.set_style(search_style());
                bar.set_prefix(source.clone());
                bar
            });
            bar.set_length(counter.total as u64);
            bar.set_position(counter.completed as u64);
        }
        self.overall.set_length(snapshot.overall.total as u64);
        self.overall.set_position(snapshot.overall.completed as u64);
    }

    pub fn finish(&self) {
        let per_source = self.per_source.lock().expect("bar map lock poisoned");
        for bar in per_source.values() {
            bar.finish();
        }
        self.overall.finish();
    }
}

/// One bar per downloading item; indeterminate spinners until a total is
/// known, re-based when the engine reports the true size.
pub struct DownloadBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
}

impl DownloadBars {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn trimmed_title(record: &MediaRecord) -> String {
        let title = record.title.as_str();
        if title.len() > 13 {
            let cut: String = title.chars().take(10).collect();
            format!("{cut}...")
        } else {
            title.to_string()
        }
    }
}

impl DownloadObserver for DownloadBars {
    fn started(&self, id: usize, record: &MediaRecord, total_bytes: Option<u64>) {
        let bar = match total_bytes {
            Some(total) => {
                let bar = self.multi.add(ProgressBar::new(total));
                bar.set_style(
                    ProgressStyle::with_template(DOWNLOAD_TEMPLATE)
                        .expect("valid progress template"),
                );
                bar
            }
            None => {
                let bar = self.multi.add(ProgressBar::no_length());
                bar.set_style(
                    ProgressStyle::with_template(DOWNLOAD_SPINNER_TEMPLATE)
                        .expect("valid progress template"),
                );
                bar
            }
        };
        bar.set_prefix(Self::trimmed_title(record));
        self.bars.lock().expect("bar map lock poisoned").insert(id, bar);
    }

    fn advanced(&self, id: usize, bytes_done: u64, _total_bytes: Option<u64>) {
        if let Some(bar) = self.bars.lock().expect("bar map lock poisoned").get(&id) {
            bar.set_position(bytes_done);
        }
    }

    fn rebased(&self, id: usize, total_bytes: u64) {
        if let Some(bar) = self.bars.lock().expect("bar map lock poisoned").get(&id) {
            bar.set_length(total_bytes);
        }
    }

    fn completed(&self, id: usize, _path: &Path) {
        if let Some(bar) = self.bars.lock().expect("bar map lock poisoned").get(&id) {
            bar.set_message("done");
            bar.finish();
        }
    }

    fn failed(&self, id: usize, error: &DownloadError) {
        if let Some(bar) = self.bars.lock().expect("bar map lock poisoned").get(&id) {
            bar.set_message(format!("failed: {error}"));
            bar.abandon();
        }
    }
}
