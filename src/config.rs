use serde::Deserialize;
use std::path::Path;

use crate::signals::thresholds::{CategoryWeights, ThresholdCatalog};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scoring: ScoringConfig,
    pub alerts: AlertConfig,
    pub notifications: NotificationConfig,
    pub thresholds: ThresholdCatalog,
    pub weights: CategoryWeights,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    pub model_version: String,
    pub reading_window_hours: i64,
    pub event_window_days: i64,
    pub interval_seconds: u64,
    pub reading_queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertConfig {
    pub dedupe_cooldown_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub queue_capacity: usize,
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/homeguard.db".into(),
        }
    }
}

impl ScoringConfig {
    pub const MAX_READING_WINDOW_HOURS: i64 = 24 * 366;
    pub const MAX_EVENT_WINDOW_DAYS: i64 = 3650;

    /// Reset any window outside its allowed range to the default.
    fn sanitize(&mut self) {
        let defaults = Self::default();
        if !(1..=Self::MAX_READING_WINDOW_HOURS).contains(&self.reading_window_hours) {
            tracing::warn!(
                "scoring.reading_window_hours = {} out of range, using {}",
                self.reading_window_hours,
                defaults.reading_window_hours
            );
            self.reading_window_hours = defaults.reading_window_hours;
        }
        if !(1..=Self::MAX_EVENT_WINDOW_DAYS).contains(&self.event_window_days) {
            tracing::warn!(
                "scoring.event_window_days = {} out of range, using {}",
                self.event_window_days,
                defaults.event_window_days
            );
            self.event_window_days = defaults.event_window_days;
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            model_version: "2.0.0".into(),
            reading_window_hours: 24,
            event_window_days: 30,
            interval_seconds: 900,
            reading_queue_capacity: 4096,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            dedupe_cooldown_seconds: 300,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 1024,
            timeout_seconds: 10,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(contents)?;
        if !config.weights.is_normalized() {
            tracing::warn!(
                "Category weights sum to {:.4}, expected 1.0; using defaults",
                config.weights.sum()
            );
            config.weights = CategoryWeights::default();
        }
        config.scoring.sanitize();
        Ok(config)
    }
}
