use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use engagement_pipeline::aggregator;
use engagement_pipeline::collector::{self, SourceAdapter};
use engagement_pipeline::collector::github::GitHubAdapter;
use engagement_pipeline::collector::goatcounter::GoatCounterAdapter;
use engagement_pipeline::config::Config;
use engagement_pipeline::history::HistoryStore;
use engagement_pipeline::report;
use engagement_pipeline::types::MetricWindow;

#[derive(Parser, Debug)]
#[command(name = "engagement-pipeline", about = "Scheduled engagement metrics aggregation pipeline")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the reporting window length in days
    #[arg(long)]
    days: Option<u64>,

    /// Validate config and exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,
}

#[tokio::main(worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("engagement-pipeline {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration; a malformed rule set must fail here, not after
    // fetching.
    let mut config = Config::load(&cli.config)?;
    if let Some(days) = cli.days {
        config.pipeline.window_days = days;
    }

    if cli.check {
        println!("Configuration is valid.");
        return Ok(());
    }

    // Initialize logging
    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        window_days = config.pipeline.window_days,
        "Starting engagement pipeline"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "Pipeline terminated with error");
        return Err(e);
    }

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(&config.pipeline.log_level)
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let window = MetricWindow::ending(Utc::now().date_naive(), config.pipeline.window_days);
    let per_request = Duration::from_secs(config.pipeline.fetch_timeout_secs);

    let web_adapter = GoatCounterAdapter::new(&config.goatcounter, per_request)?;
    let activity_adapter = GitHubAdapter::new(&config.github, per_request)?;

    // Wall-clock budget per source: one request slot per upstream call.
    let web_budget = per_request * 3;
    let activity_budget = per_request * config.github.orgs.len().max(1) as u32;

    // The fetches are independent; neither may block the other indefinitely.
    let (web, activity) = tokio::join!(
        collector::fetch_with_timeout(&web_adapter, window, web_budget),
        collector::fetch_with_timeout(&activity_adapter, window, activity_budget),
    );

    if let Some(reason) = unavailable_reason(&web) {
        warn!(source = web_adapter.name(), reason, "Source degraded");
    }
    if let Some(reason) = unavailable_reason(&activity) {
        warn!(source = activity_adapter.name(), reason, "Source degraded");
    }

    // Trend computation needs the prior snapshots before the new one lands.
    let history = HistoryStore::new(&config.pipeline.history_dir);
    let recent = history.load_recent(aggregator::TREND_WINDOW);

    let result = aggregator::aggregate(
        window,
        Utc::now(),
        &web,
        &activity,
        &recent,
        &config.thresholds.rules,
    );

    let out_dir = Path::new(&config.pipeline.output_dir);
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir: {}", out_dir.display()))?;
    write_doc(out_dir, "engagement-metrics.json", aggregator::to_json(&result.engagement)?)?;
    write_doc(out_dir, "system-engagement-report.json", aggregator::to_json(&result.report)?)?;

    let views_series: Vec<f64> = recent
        .iter()
        .map(|s| s.site_totals.page_views as f64)
        .chain(std::iter::once(result.snapshot.site_totals.page_views as f64))
        .collect();
    let dashboard = report::write_dashboard(
        Path::new(&config.pipeline.dashboard_dir),
        &result.engagement,
        &result.report,
        &views_series,
    )?;
    info!(path = %dashboard.display(), "Dashboard generated");

    // History append is the last step: an interrupted run leaves the store
    // untouched, and a failed append still counts as a successful run.
    if let Err(e) = history.append(&result.snapshot) {
        warn!(error = %e, "Failed to persist history snapshot; trends will miss this window");
    }

    info!(
        web_available = result.engagement.available,
        github_available = result.report.github_activity.available,
        pages = result.engagement.pages.len(),
        alerts = result.report.alerts.len(),
        "Aggregation complete"
    );

    Ok(())
}

fn unavailable_reason<T>(outcome: &engagement_pipeline::types::FetchOutcome<T>) -> Option<&str> {
    match outcome {
        engagement_pipeline::types::FetchOutcome::Available(_) => None,
        engagement_pipeline::types::FetchOutcome::Unavailable { reason } => Some(reason),
    }
}

fn write_doc(dir: &Path, name: &str, json: String) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, json)
        .with_context(|| format!("Failed to write output document: {}", path.display()))?;
    Ok(())
}
