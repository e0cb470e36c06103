use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use homeguard::alerts::AlertEngine;
use homeguard::alerts::dedupe::{Deduplicator, MemoryDedupeStore};
use homeguard::config::Config;
use homeguard::core::pipeline;
use homeguard::db::{SharedDatabase, Store};
use homeguard::notifications::Notifier;
use homeguard::signals::RiskEngine;

const JANITOR_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("homeguard=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("HomeGuard starting...");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".into());
    let config = Config::load(&config_path);
    tracing::debug!("Config: {:?}", config);

    // Open the reading/event/score store
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Arc::new(SharedDatabase::open(db_path)?);
    tracing::info!("Database opened at {}", config.database.path);
    let store: Arc<dyn Store> = db.clone();

    // Notifier worker
    let (notifier, notifier_task) =
        Notifier::start(&config.notifications, store.clone(), db.clone())?;

    // Alerting
    let dedupe_store = Arc::new(MemoryDedupeStore::new());
    let dedupe = Deduplicator::new(
        dedupe_store.clone(),
        Duration::from_secs(config.alerts.dedupe_cooldown_seconds),
    );
    let catalog = Arc::new(config.thresholds.clone());
    let alerts = Arc::new(AlertEngine::new(catalog.clone(), dedupe, notifier.clone()));

    // Scoring
    let engine = Arc::new(RiskEngine::new(
        store.clone(),
        &catalog,
        config.weights.clone(),
        &config.scoring,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(pipeline::run_scoring_scheduler(
        engine,
        store.clone(),
        Duration::from_secs(config.scoring.interval_seconds.max(1)),
        shutdown_rx.clone(),
    ));
    let janitor = tokio::spawn(pipeline::run_dedupe_janitor(
        dedupe_store,
        JANITOR_PERIOD,
        shutdown_rx,
    ));

    // stdin -> pipeline
    let (reading_tx, reading_rx) = mpsc::channel(config.scoring.reading_queue_capacity.max(1));
    let pipeline_task = tokio::spawn(pipeline::run_pipeline(reading_rx, alerts, store));
    tracing::info!("Pipeline started, reading NDJSON from stdin");

    pipeline::ingest_lines(BufReader::new(tokio::io::stdin()), reading_tx).await;

    // Drain the pipeline, then stop the periodic tasks
    pipeline_task.await?;
    shutdown_tx.send(true).ok();
    scheduler.await?;
    janitor.await?;

    tracing::info!("Notifications dropped at submit: {}", notifier.stats().dropped());
    drop(notifier);
    if let Some(task) = notifier_task {
        task.await?;
    }

    tracing::info!("HomeGuard stopped");
    Ok(())
}
