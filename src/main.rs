// src/main.rs

//! plus-sync CLI.
//!
//! Entry point wiring the content source client, object storage, the sync
//! orchestrator and the snapshot pipeline behind a set of subcommands. The
//! `schedule` subcommand runs the weekly cycle on its configured period;
//! everything else is a one-shot invocation.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use plus_sync::config::{Config, LoggingConfig};
use plus_sync::error::{AppError, Result};
use plus_sync::models::{DeltaWindow, SyncMode};
use plus_sync::pipeline::{
    CheckpointStore, Orchestrator, PageNormalizer, Reconciler, RefreshController,
    SnapshotPublisher, WeeklyPipeline,
};
use plus_sync::services::{
    CachedTokenProvider, EmbeddingSettings, EnvTokenSource, Fetcher, HttpControlPlane,
    JsonDocumentIndex, PageFetch, RetryPolicy, SourceClient,
};
use plus_sync::storage::{LocalStore, ObjectStore, S3Store};

#[derive(Parser, Debug)]
#[command(
    name = "plus-sync",
    version,
    about = "Bilingual content synchronization and search index maintenance"
)]
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an ad-hoc sync
    Sync {
        /// Restrict to content updated within "week" or "month"
        #[arg(long)]
        window: Option<String>,
    },
    /// Resume a checkpointed run after a restart
    Resume { run_id: String },
    /// Show the checkpointed state of a run
    Status { run_id: String },
    /// Reconcile one sync window into the latest snapshot
    Reconcile {
        /// Window date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Publish the latest snapshot to the serving bucket
    Publish,
    /// Restart the serving instances against the published snapshot
    Refresh,
    /// Run one full weekly cycle now
    Weekly,
    /// Run the weekly cycle on its configured period
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);
    init_logging(&config.logging);
    config.validate()?;

    match cli.command {
        Command::Sync { window } => {
            let mode = match window {
                Some(w) => SyncMode::Delta(parse_window(&w)?),
                None => SyncMode::Full,
            };
            let store = data_store(&config).await?;
            let orchestrator = orchestrator(&config, Arc::clone(&store), RetryPolicy::adhoc())?;
            let (run_id, summary) = orchestrator.start(mode).await?;
            info!(
                run_id = %run_id,
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Sync finished"
            );
        }
        Command::Resume { run_id } => {
            let store = data_store(&config).await?;
            let orchestrator = orchestrator(&config, Arc::clone(&store), RetryPolicy::adhoc())?;
            let summary = orchestrator.resume(&run_id).await?;
            info!(
                run_id = %run_id,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Resume finished"
            );
        }
        Command::Status { run_id } => {
            let store = data_store(&config).await?;
            let state = CheckpointStore::new(store)
                .load(&run_id)
                .await?
                .ok_or_else(|| AppError::orchestration(format!("unknown run id {run_id}")))?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Reconcile { date } => {
            let date = date.unwrap_or_else(today);
            let store = data_store(&config).await?;
            let mut reconciler = reconciler(&config, store);
            let outcome = reconciler.reconcile_window(&date).await?;
            info!(
                date = %date,
                batch = outcome.batch_size,
                skipped = outcome.skipped,
                deleted = outcome.deleted,
                inserted = outcome.inserted,
                "Reconcile finished"
            );
        }
        Command::Publish => {
            let store = data_store(&config).await?;
            let publisher = publisher(&config, store).await?;
            let published = publisher.publish_latest().await?;
            info!(published, "Publish finished");
        }
        Command::Refresh => {
            refresher(&config)?.refresh().await?;
            info!("Serving refresh finished");
        }
        Command::Weekly => {
            let outcome = weekly_pipeline(&config).await?.run().await?;
            info!(
                run_id = %outcome.run_id,
                fetched = outcome.summary.succeeded,
                reconciled = outcome.reconcile.inserted,
                published = outcome.published,
                "Weekly cycle finished"
            );
        }
        Command::Schedule => {
            let period = Duration::from_secs(config.sync.schedule_period_days * 24 * 60 * 60);
            let mut pipeline = weekly_pipeline(&config).await?;
            info!(period_days = config.sync.schedule_period_days, "Scheduler started");
            loop {
                // One failed cycle must not stop the schedule.
                if let Err(e) = pipeline.run().await {
                    error!(error = %e, "Scheduled cycle failed");
                }
                tokio::time::sleep(period).await;
            }
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn parse_window(window: &str) -> Result<DeltaWindow> {
    match window {
        "week" => Ok(DeltaWindow::Week),
        "month" => Ok(DeltaWindow::Month),
        other => Err(AppError::config(format!(
            "unknown delta window {other:?}; expected \"week\" or \"month\""
        ))),
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn token_provider(config: &Config) -> Arc<CachedTokenProvider> {
    Arc::new(CachedTokenProvider::new(Box::new(EnvTokenSource::new(
        config.source.token_env.as_str(),
    ))))
}

async fn data_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    store_for(config, config.storage.bucket.as_str(), &config.storage.local_root).await
}

async fn serving_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let local_root = format!("{}-serving", config.storage.local_root);
    store_for(config, config.storage.serving_bucket.as_str(), &local_root).await
}

async fn store_for(
    config: &Config,
    bucket: &str,
    local_root: &str,
) -> Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        "local" => Ok(Arc::new(LocalStore::new(local_root))),
        "s3" => Ok(Arc::new(S3Store::from_env(bucket).await)),
        other => Err(AppError::config(format!(
            "unknown storage backend {other:?}; expected \"local\" or \"s3\""
        ))),
    }
}

fn orchestrator(
    config: &Config,
    store: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
) -> Result<Orchestrator> {
    let tokens = token_provider(config);
    let client = Arc::new(SourceClient::new(&config.source, tokens)?);
    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&client) as Arc<dyn PageFetch>,
        Arc::clone(&store),
        policy,
    ));
    Ok(Orchestrator::new(
        client,
        fetcher,
        store,
        config.source.domain.as_str(),
        config.source.locales.clone(),
        config.source.primary_locale.as_str(),
        config.sync.fetch_concurrency,
    ))
}

fn reconciler(config: &Config, store: Arc<dyn ObjectStore>) -> Reconciler {
    Reconciler::new(
        store,
        Arc::new(PageNormalizer::new()),
        Box::new(JsonDocumentIndex::new(EmbeddingSettings::from(
            &config.index,
        ))),
    )
}

async fn publisher(config: &Config, store: Arc<dyn ObjectStore>) -> Result<SnapshotPublisher> {
    let serving = serving_store(config).await?;
    Ok(SnapshotPublisher::new(
        store,
        serving,
        config.storage.serving_prefix.as_str(),
    ))
}

fn refresher(config: &Config) -> Result<RefreshController> {
    let plane = HttpControlPlane::new(config.control_plane.clone(), token_provider(config))?;
    Ok(RefreshController::new(
        Arc::new(plane),
        Duration::from_secs(config.control_plane.poll_interval_secs),
        config.control_plane.max_polls,
    ))
}

fn scheduled_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::new(
        config.sync.scheduled_attempts,
        Duration::from_secs(config.sync.retry_delay_secs),
    )
}

async fn weekly_pipeline(config: &Config) -> Result<WeeklyPipeline> {
    let store = data_store(config).await?;
    Ok(WeeklyPipeline::new(
        orchestrator(config, Arc::clone(&store), scheduled_policy(config))?,
        CheckpointStore::new(Arc::clone(&store)),
        reconciler(config, Arc::clone(&store)),
        publisher(config, store).await?,
        refresher(config)?,
    ))
}
