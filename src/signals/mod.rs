pub mod rules;
pub mod score;
pub mod thresholds;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::core::{Category, Event, Reading, RiskScores, RiskTier};
use crate::db::Store;
use crate::error::StoreError;
use rules::CategoryScorer;
use thresholds::{CategoryWeights, ThresholdCatalog};

/// The risk engine applies every category scorer to a home's recent
/// history and folds the results into one weighted record.
pub struct RiskEngine {
    store: Arc<dyn Store>,
    scorers: Vec<Box<dyn CategoryScorer + Send + Sync>>,
    weights: CategoryWeights,
    model_version: String,
    reading_window: Duration,
    event_window_days: i64,
}

impl RiskEngine {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: &ThresholdCatalog,
        weights: CategoryWeights,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            store,
            scorers: rules::default_scorers(catalog),
            weights,
            model_version: scoring.model_version.clone(),
            // An unrepresentable window surfaces as a store error per cycle.
            reading_window: Duration::try_hours(scoring.reading_window_hours)
                .unwrap_or(Duration::MAX),
            event_window_days: scoring.event_window_days,
        }
    }

    /// Pure scoring step: no I/O, `now` supplied by the caller.
    pub fn score_home(
        &self,
        home_id: &str,
        readings: &[Reading],
        events: &[Event],
        now: DateTime<Utc>,
    ) -> RiskScores {
        let mut by_category: HashMap<Category, Vec<&Reading>> = HashMap::new();
        for reading in readings {
            by_category.entry(reading.category()).or_default().push(reading);
        }

        let mut scores = RiskScores {
            timestamp: now,
            home_id: home_id.to_string(),
            water_score: 0.0,
            gas_score: 0.0,
            structural_score: 0.0,
            hvac_score: 0.0,
            air_score: 0.0,
            energy_score: 0.0,
            fire_score: 0.0,
            overall_score: 0.0,
            risk_tier: RiskTier::Critical,
            confidence: 0.0,
            model_version: self.model_version.clone(),
        };

        for scorer in &self.scorers {
            let category = scorer.category();
            let group = by_category.get(&category).map(Vec::as_slice).unwrap_or(&[]);
            scores.set_score(category, scorer.score(group, events, now));
        }

        scores.overall_score = score::compute_overall(&scores, &self.weights);
        scores.risk_tier = RiskTier::from_score(scores.overall_score);
        scores.confidence = score::confidence(readings.len());
        scores
    }

    /// Read the home's windows, score, persist, and return the record.
    pub async fn compute_risk_scores(&self, home_id: &str) -> Result<RiskScores, StoreError> {
        let readings = self.store.recent_readings(home_id, self.reading_window).await?;
        let events = self.store.recent_events(home_id, self.event_window_days).await?;
        debug!(
            "Scoring {home_id}: {} readings, {} events",
            readings.len(),
            events.len()
        );

        let scores = self.score_home(home_id, &readings, &events, Utc::now());
        self.store.insert_risk_score(&scores).await?;
        Ok(scores)
    }

    /// One scoring cycle per home, run concurrently. A failing home does not
    /// affect the others.
    pub async fn score_homes(
        &self,
        home_ids: Vec<String>,
    ) -> Vec<(String, Result<RiskScores, StoreError>)> {
        let futures: Vec<_> = home_ids
            .iter()
            .map(|home_id| self.compute_risk_scores(home_id))
            .collect();
        let results = join_all(futures).await;

        for (home_id, result) in home_ids.iter().zip(&results) {
            match result {
                Ok(s) => info!(
                    "Scored {home_id}: overall={:.1} tier={} confidence={}",
                    s.overall_score,
                    s.risk_tier.as_str(),
                    s.confidence
                ),
                Err(e) => warn!("Scoring failed for {home_id}: {e}"),
            }
        }

        home_ids.into_iter().zip(results).collect()
    }
}
