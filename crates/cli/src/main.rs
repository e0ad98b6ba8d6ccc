mod progress;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crescendo_core::config::SourceSettings;
use crescendo_core::download::DownloadConfig;
use crescendo_core::search::SearchRunConfig;
use crescendo_core::validator::LinkValidator;
use crescendo_core::{
    known_source_names, load_config, validate_config, AdapterRegistry, Config,
    DownloadOrchestrator, HttpClient, HttpPolicy, QualityChain, RequestContext,
    SearchOrchestrator, SessionMode, DEFAULT_SOURCES,
};

use progress::{DownloadBars, SearchBars};

/// Concurrent multi-source music search and download.
#[derive(Debug, Parser)]
#[command(name = "crescendo", version, about)]
struct Args {
    /// Keyword to search for.
    #[arg(short, long)]
    keyword: String,

    /// Comma-separated list of source adapters.
    #[arg(short, long)]
    sources: Option<String>,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory for run output (overrides the config file).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON map of per-source worker counts, e.g. '{"jamendo": 8}'.
    #[arg(long)]
    workers: Option<String>,

    /// JSON map of per-source settings, e.g. '{"tunehub": {"search_size": 3}}'.
    #[arg(long)]
    source_config: Option<String>,

    /// JSON map of extra request headers applied to every upstream call.
    #[arg(long)]
    request_overrides: Option<String>,

    /// Per-source result cap, applied to every selected source.
    #[arg(long)]
    limit: Option<usize>,

    /// Search and write the snapshot without downloading anything.
    #[arg(long)]
    no_download: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let source_names: Vec<String> = match &args.sources {
        Some(csv) => {
            let mut names: Vec<String> = csv
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            names.dedup();
            names
        }
        None => DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
    };
    if source_names.is_empty() {
        bail!("no sources given");
    }

    validate_config(&config, &known_source_names())
        .context("Configuration validation failed")?;

    let policy = HttpPolicy {
        max_retries: config.network.max_retries,
        request_timeout: std::time::Duration::from_secs(config.network.request_timeout_secs),
        session_mode: if config.network.reuse_session {
            SessionMode::Shared
        } else {
            SessionMode::FreshPerCall
        },
        proxy: config.network.proxy.clone(),
    };
    let http = HttpClient::new(policy).context("Failed to build HTTP client")?;
    let chain = QualityChain::new(LinkValidator::new(http.clone()));

    let registry = AdapterRegistry::build(&source_names, &config.sources, &http, &chain)
        .context("Failed to build source registry")?;
    if registry.is_empty() {
        bail!("every requested source is disabled");
    }

    let ctx = request_context(&args)?;
    info!(keyword = %args.keyword, sources = ?source_names, "searching");

    let orchestrator =
        SearchOrchestrator::new(registry, SearchRunConfig::from_config(&config));
    let bars = SearchBars::new();
    orchestrator.progress().set_listener(bars.clone().listener());
    let outcome = orchestrator.run(&args.keyword, &ctx).await;
    bars.finish();

    print_results(&outcome.records);
    if !outcome.failures.is_empty() {
        warn!(failed_tasks = outcome.failures.len(), "some sources had failures");
    }
    if outcome.records.is_empty() {
        info!("nothing found");
        return Ok(());
    }
    if args.no_download {
        return Ok(());
    }

    let dest_dir = outcome
        .work_dir
        .clone()
        .unwrap_or_else(|| config.run.work_dir.clone());
    let downloader = DownloadOrchestrator::new(http, DownloadConfig::from_config(&config))
        .with_observer(DownloadBars::new());
    let result = downloader.download(outcome.records, &dest_dir, &ctx).await;

    println!(
        "\nDownloaded {} file(s) to {} ({} failed)",
        result.completed.len(),
        dest_dir.display(),
        result.failures.len(),
    );

    Ok(())
}

/// Load the config file (if any) and fold the CLI override maps on top.
fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(output) = &args.output {
        config.run.work_dir = output.clone();
    }

    if let Some(raw) = &args.source_config {
        let overrides: BTreeMap<String, SourceSettings> =
            serde_json::from_str(raw).context("Failed to parse --source-config")?;
        config.sources.extend(overrides);
    }

    if let Some(raw) = &args.workers {
        let overrides: BTreeMap<String, usize> =
            serde_json::from_str(raw).context("Failed to parse --workers")?;
        for (source, workers) in overrides {
            config.sources.entry(source).or_default().workers = workers;
        }
    }

    if let Some(limit) = args.limit {
        for name in known_source_names() {
            config
                .sources
                .entry(name.to_string())
                .or_default()
                .search_size = limit;
        }
    }

    Ok(config)
}

fn request_context(args: &Args) -> Result<RequestContext> {
    let mut ctx = RequestContext::new();
    if let Some(raw) = &args.request_overrides {
        let headers: BTreeMap<String, String> =
            serde_json::from_str(raw).context("Failed to parse --request-overrides")?;
        ctx = ctx.with_headers(headers);
    }
    Ok(ctx)
}

fn print_results(records: &[crescendo_core::MediaRecord]) {
    if records.is_empty() {
        return;
    }
    println!(
        "\n{:>4}  {:<24} {:<32} {:>12} {:>9}  {}",
        "ID", "Artists", "Title", "Size", "Duration", "Source"
    );
    for (i, record) in records.iter().enumerate() {
        let size = record
            .size_bytes()
            .map(|b| format!("{:.2} MB", b as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| "-".to_string());
        let duration = record
            .duration_secs
            .map(|s| format!("{}:{:02}", s / 60, s % 60))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<24} {:<32} {:>12} {:>9}  {}",
            i + 1,
            truncate(&record.artists, 24),
            truncate(&record.title, 32),
            size,
            duration,
            record.source,
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
