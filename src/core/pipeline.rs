use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::alerts::AlertEngine;
use crate::alerts::dedupe::MemoryDedupeStore;
use crate::core::Reading;
use crate::db::Store;
use crate::signals::RiskEngine;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub malformed: u64,
}

/// Parse newline-delimited JSON readings and forward them to the pipeline.
/// Blank lines are skipped; malformed lines are logged and counted.
pub async fn ingest_lines<R>(mut reader: R, tx: mpsc::Sender<Reading>) -> IngestStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read input: {e}");
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                stats.malformed += 1;
                debug!("Skipping non UTF-8 line: {e}");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Reading>(line) {
            Ok(reading) => {
                if tx.send(reading).await.is_err() {
                    info!("Pipeline closed, stopping ingest");
                    break;
                }
                stats.accepted += 1;
            }
            Err(e) => {
                stats.malformed += 1;
                debug!("Skipping malformed reading: {e}");
            }
        }
    }

    info!(
        "Ingest finished: {} readings, {} malformed",
        stats.accepted, stats.malformed
    );
    stats
}

/// Run the pipeline: store each reading, evaluate it, persist admitted events.
pub async fn run_pipeline(
    mut rx: mpsc::Receiver<Reading>,
    alerts: Arc<AlertEngine>,
    store: Arc<dyn Store>,
) -> u64 {
    let mut reading_count: u64 = 0;
    let mut event_count: u64 = 0;

    info!("Pipeline started, waiting for readings...");

    while let Some(reading) = rx.recv().await {
        if let Err(e) = store.insert_reading(&reading).await {
            warn!("Failed to store reading from {}: {e}", reading.sensor_id);
        }

        if let Some(event) = alerts.evaluate_reading(&reading).await {
            event_count += 1;
            if let Err(e) = store.insert_event(&event).await {
                warn!("Failed to store event {}: {e}", event.event_id);
            }
        }

        reading_count += 1;
        if reading_count % 1000 == 0 {
            info!("Pipeline processed {reading_count} readings, {event_count} events");
        }
    }

    info!("Pipeline shutting down after {reading_count} readings, {event_count} events");
    event_count
}

/// Score every active home on a fixed period until `shutdown` flips.
pub async fn run_scoring_scheduler(
    engine: Arc<RiskEngine>,
    store: Arc<dyn Store>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let home_ids = match store.active_home_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list active homes: {e}");
                continue;
            }
        };
        if home_ids.is_empty() {
            debug!("No active homes to score");
            continue;
        }

        let total = home_ids.len();
        let results = engine.score_homes(home_ids).await;
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!("Scoring cycle done: {} of {total} homes scored", total - failed);
    }

    info!("Scoring scheduler stopped");
}

/// Periodically drop expired dedupe keys.
pub async fn run_dedupe_janitor(
    store: Arc<MemoryDedupeStore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!("Purged {purged} expired dedupe keys");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
