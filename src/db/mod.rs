pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{Event, Home, Reading, RiskScores, WebhookTarget};
use crate::error::StoreError;

/// Time-series storage consumed by the scoring and alerting core.
#[async_trait]
pub trait Store: Send + Sync {
    /// Readings for a home newer than `now - window`, newest first.
    async fn recent_readings(
        &self,
        home_id: &str,
        window: Duration,
    ) -> Result<Vec<Reading>, StoreError>;
    /// Events for a home from the last `days` days, newest first.
    async fn recent_events(&self, home_id: &str, days: i64) -> Result<Vec<Event>, StoreError>;
    async fn insert_risk_score(&self, scores: &RiskScores) -> Result<(), StoreError>;
    async fn home_by_id(&self, home_id: &str) -> Result<Home, StoreError>;
    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError>;
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn active_home_ids(&self) -> Result<Vec<String>, StoreError>;
    async fn latest_risk_score(&self, home_id: &str) -> Result<Option<RiskScores>, StoreError>;
}

/// Resolves where a carrier wants its webhooks delivered.
#[async_trait]
pub trait CarrierDirectory: Send + Sync {
    async fn webhook_target(&self, carrier_id: &str) -> Result<Option<WebhookTarget>, StoreError>;
}

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Register or update a monitored home.
    pub fn upsert_home(&self, home: &Home) -> Result<(), StoreError> {
        self.lock()?.upsert_home(home)
    }

    /// Register or update a carrier and its webhook target.
    pub fn upsert_carrier(
        &self,
        carrier_id: &str,
        name: &str,
        webhook: Option<&WebhookTarget>,
    ) -> Result<(), StoreError> {
        self.lock()?.upsert_carrier(carrier_id, name, webhook)
    }
}

impl SharedDatabase {
    /// Run `f` against the connection on the blocking pool so SQLite work
    /// never stalls the async workers.
    async fn with_db<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock()?;
            f(&guard)
        })
        .await?
    }
}

/// `now - window`, or an error when the window is outside chrono's range.
fn window_start(window: Duration) -> Result<DateTime<Utc>, StoreError> {
    Utc::now()
        .checked_sub_signed(window)
        .ok_or(StoreError::WindowOutOfRange)
}

#[async_trait]
impl Store for SharedDatabase {
    async fn recent_readings(
        &self,
        home_id: &str,
        window: Duration,
    ) -> Result<Vec<Reading>, StoreError> {
        let since = window_start(window)?;
        let home_id = home_id.to_string();
        self.with_db(move |db| db.readings_since(&home_id, since)).await
    }

    async fn recent_events(&self, home_id: &str, days: i64) -> Result<Vec<Event>, StoreError> {
        let since = window_start(Duration::try_days(days).ok_or(StoreError::WindowOutOfRange)?)?;
        let home_id = home_id.to_string();
        self.with_db(move |db| db.events_since(&home_id, since)).await
    }

    async fn insert_risk_score(&self, scores: &RiskScores) -> Result<(), StoreError> {
        let scores = scores.clone();
        self.with_db(move |db| db.insert_risk_score(&scores)).await
    }

    async fn home_by_id(&self, home_id: &str) -> Result<Home, StoreError> {
        let home_id = home_id.to_string();
        self.with_db(move |db| {
            db.home_by_id(&home_id)?
                .ok_or_else(|| StoreError::HomeNotFound(home_id.clone()))
        })
        .await
    }

    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let reading = reading.clone();
        self.with_db(move |db| db.insert_reading(&reading)).await
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        let event = event.clone();
        self.with_db(move |db| db.insert_event(&event)).await
    }

    async fn active_home_ids(&self) -> Result<Vec<String>, StoreError> {
        self.with_db(|db| db.active_home_ids()).await
    }

    async fn latest_risk_score(&self, home_id: &str) -> Result<Option<RiskScores>, StoreError> {
        let home_id = home_id.to_string();
        self.with_db(move |db| db.latest_risk_score(&home_id)).await
    }
}

#[async_trait]
impl CarrierDirectory for SharedDatabase {
    async fn webhook_target(&self, carrier_id: &str) -> Result<Option<WebhookTarget>, StoreError> {
        let carrier_id = carrier_id.to_string();
        self.with_db(move |db| db.webhook_target(&carrier_id)).await
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn upsert_home(&self, home: &Home) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO homes (home_id, carrier_id, policy_number, active)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                home.home_id,
                home.carrier_id,
                home.policy_number,
                home.active as i32
            ],
        )?;
        Ok(())
    }

    pub fn upsert_carrier(
        &self,
        carrier_id: &str,
        name: &str,
        webhook: Option<&WebhookTarget>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO carriers (carrier_id, name, webhook_url, webhook_secret)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                carrier_id,
                name,
                webhook.map(|w| w.url.as_str()),
                webhook.map(|w| w.secret.as_str())
            ],
        )?;
        Ok(())
    }

    pub fn home_by_id(&self, home_id: &str) -> Result<Option<Home>, StoreError> {
        let home = self
            .conn
            .query_row(
                "SELECT home_id, carrier_id, policy_number, active FROM homes WHERE home_id = ?1",
                rusqlite::params![home_id],
                |row| {
                    let active: i32 = row.get(3)?;
                    Ok(Home {
                        home_id: row.get(0)?,
                        carrier_id: row.get(1)?,
                        policy_number: row.get(2)?,
                        active: active != 0,
                    })
                },
            )
            .optional()?;
        Ok(home)
    }

    pub fn active_home_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT home_id FROM homes WHERE active = 1 ORDER BY home_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// A carrier without a URL, or with an empty one, has no target.
    pub fn webhook_target(&self, carrier_id: &str) -> Result<Option<WebhookTarget>, StoreError> {
        let row: Option<(Option<String>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT webhook_url, webhook_secret FROM carriers WHERE carrier_id = ?1",
                rusqlite::params![carrier_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((Some(url), secret)) if !url.is_empty() => Some(WebhookTarget {
                url,
                secret: secret.unwrap_or_default(),
            }),
            _ => None,
        })
    }

    pub fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let json = serde_json::to_string(reading)?;
        self.conn.execute(
            "INSERT INTO readings (ts, home_id, sensor_id, sensor_type, reading)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                ts(reading.timestamp),
                reading.home_id,
                reading.sensor_id,
                reading.category().as_str(),
                json
            ],
        )?;
        Ok(())
    }

    pub fn readings_since(
        &self,
        home_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT reading FROM readings WHERE home_id = ?1 AND ts >= ?2 ORDER BY ts DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![home_id, ts(since)], |row| {
            row.get::<_, String>(0)
        })?;
        let mut readings = Vec::new();
        for json in rows {
            readings.push(serde_json::from_str(&json?)?);
        }
        Ok(readings)
    }

    pub fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        let json = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO events (event_id, ts, home_id, event_type, severity, event)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                event.event_id,
                ts(event.timestamp),
                event.home_id,
                event.event_type.as_str(),
                event.severity.as_str(),
                json
            ],
        )?;
        Ok(())
    }

    pub fn events_since(
        &self,
        home_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT event FROM events WHERE home_id = ?1 AND ts >= ?2 ORDER BY ts DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![home_id, ts(since)], |row| {
            row.get::<_, String>(0)
        })?;
        let mut events = Vec::new();
        for json in rows {
            events.push(serde_json::from_str(&json?)?);
        }
        Ok(events)
    }

    pub fn insert_risk_score(&self, s: &RiskScores) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO risk_scores (ts, home_id, water_score, gas_score, structural_score, hvac_score, air_score, energy_score, fire_score, overall_score, risk_tier, confidence, model_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                ts(s.timestamp), s.home_id, s.water_score, s.gas_score, s.structural_score,
                s.hvac_score, s.air_score, s.energy_score, s.fire_score, s.overall_score,
                s.risk_tier.as_str(), s.confidence, s.model_version
            ],
        )?;
        Ok(())
    }

    pub fn latest_risk_score(&self, home_id: &str) -> Result<Option<RiskScores>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT ts, home_id, water_score, gas_score, structural_score, hvac_score, air_score, energy_score, fire_score, overall_score, risk_tier, confidence, model_version
                 FROM risk_scores WHERE home_id = ?1 ORDER BY ts DESC, id DESC LIMIT 1",
                rusqlite::params![home_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(10)?,
                        RiskScores {
                            timestamp: DateTime::<Utc>::MIN_UTC,
                            home_id: row.get(1)?,
                            water_score: row.get(2)?,
                            gas_score: row.get(3)?,
                            structural_score: row.get(4)?,
                            hvac_score: row.get(5)?,
                            air_score: row.get(6)?,
                            energy_score: row.get(7)?,
                            fire_score: row.get(8)?,
                            overall_score: row.get(9)?,
                            risk_tier: crate::core::RiskTier::Critical,
                            confidence: row.get(11)?,
                            model_version: row.get(12)?,
                        },
                    ))
                },
            )
            .optional()?;

        let Some((timestamp, tier, mut scores)) = row else {
            return Ok(None);
        };
        scores.timestamp = parse_ts(&timestamp)?;
        scores.risk_tier = serde_json::from_value(serde_json::Value::String(tier))?;
        Ok(Some(scores))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::{
        EventType, GasReading, ReadingValues, RiskTier, Severity, WaterReading,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    pub(crate) fn open_test_db() -> SharedDatabase {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "homeguard_db_test_{}_{}.db",
            std::process::id(),
            id
        ));
        // Remove if leftover from previous run
        let _ = std::fs::remove_file(&path);
        SharedDatabase::open(&path).unwrap()
    }

    fn make_reading(home_id: &str, minutes_ago: i64, values: ReadingValues) -> Reading {
        Reading {
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            home_id: home_id.to_string(),
            sensor_id: "s-1".to_string(),
            values,
            anomaly: None,
        }
    }

    fn make_event(home_id: &str, days_ago: i64) -> Event {
        let reading = make_reading(home_id, 0, ReadingValues::Water(WaterReading::default()));
        let mut event = Event::from_reading(
            &reading,
            EventType::LeakDetected,
            Severity::Critical,
            "leak",
        );
        event.timestamp = Utc::now() - Duration::days(days_ago);
        event
    }

    fn make_home(home_id: &str, active: bool) -> Home {
        Home {
            home_id: home_id.to_string(),
            carrier_id: "carrier-1".to_string(),
            policy_number: format!("POL-{home_id}"),
            active,
        }
    }

    #[tokio::test]
    async fn readings_window_and_home_filter() {
        let db = open_test_db();
        let water = ReadingValues::Water(WaterReading {
            pressure: Some(45.0),
            ..WaterReading::default()
        });
        db.insert_reading(&make_reading("home-1", 5, water.clone())).await.unwrap();
        db.insert_reading(&make_reading("home-1", 60 * 30, water.clone())).await.unwrap();
        db.insert_reading(&make_reading("home-2", 5, water)).await.unwrap();
        db.insert_reading(&make_reading(
            "home-1",
            10,
            ReadingValues::Gas(GasReading { methane_ppm: Some(12.0), ..GasReading::default() }),
        ))
        .await
        .unwrap();

        let readings = db.recent_readings("home-1", Duration::hours(24)).await.unwrap();
        assert_eq!(readings.len(), 2);
        // newest first
        assert!(readings[0].timestamp > readings[1].timestamp);
        assert!(readings.iter().all(|r| r.home_id == "home-1"));
    }

    #[tokio::test]
    async fn events_window() {
        let db = open_test_db();
        db.insert_event(&make_event("home-1", 2)).await.unwrap();
        db.insert_event(&make_event("home-1", 40)).await.unwrap();
        db.insert_event(&make_event("home-2", 2)).await.unwrap();

        let events = db.recent_events("home-1", 30).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::LeakDetected);
    }

    #[tokio::test]
    async fn oversized_windows_are_errors() {
        let db = open_test_db();
        assert!(matches!(
            db.recent_events("home-1", 100_000_000).await,
            Err(StoreError::WindowOutOfRange)
        ));
        assert!(matches!(
            db.recent_events("home-1", i64::MAX).await,
            Err(StoreError::WindowOutOfRange)
        ));
        assert!(matches!(
            db.recent_readings("home-1", Duration::MAX).await,
            Err(StoreError::WindowOutOfRange)
        ));
    }

    #[tokio::test]
    async fn event_round_trip_preserves_fields() {
        let db = open_test_db();
        let event = make_event("home-1", 0).with_sensor_value(0.95).with_threshold(0.9);
        db.insert_event(&event).await.unwrap();
        let events = db.recent_events("home-1", 1).await.unwrap();
        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn home_lookup_and_missing_home() {
        let db = open_test_db();
        db.upsert_home(&make_home("home-1", true)).unwrap();
        let home = db.home_by_id("home-1").await.unwrap();
        assert_eq!(home.policy_number, "POL-home-1");
        assert!(matches!(
            db.home_by_id("nope").await,
            Err(StoreError::HomeNotFound(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn active_homes_only() {
        let db = open_test_db();
        db.upsert_home(&make_home("home-b", true)).unwrap();
        db.upsert_home(&make_home("home-a", true)).unwrap();
        db.upsert_home(&make_home("home-c", false)).unwrap();
        assert_eq!(db.active_home_ids().await.unwrap(), vec!["home-a", "home-b"]);
    }

    #[tokio::test]
    async fn webhook_targets() {
        let db = open_test_db();
        let target = WebhookTarget {
            url: "https://carrier.example/hook".into(),
            secret: "s3cret".into(),
        };
        db.upsert_carrier("carrier-1", "Acme Mutual", Some(&target)).unwrap();
        db.upsert_carrier("carrier-2", "No Hooks Inc", None).unwrap();

        assert_eq!(db.webhook_target("carrier-1").await.unwrap(), Some(target));
        assert_eq!(db.webhook_target("carrier-2").await.unwrap(), None);
        assert_eq!(db.webhook_target("carrier-3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn risk_score_history_latest() {
        let db = open_test_db();
        assert!(db.latest_risk_score("home-1").await.unwrap().is_none());

        let mut scores = RiskScores {
            timestamp: Utc::now() - Duration::hours(1),
            home_id: "home-1".into(),
            water_score: 50.0,
            gas_score: 100.0,
            structural_score: 100.0,
            hvac_score: 100.0,
            air_score: 100.0,
            energy_score: 100.0,
            fire_score: 100.0,
            overall_score: 90.0,
            risk_tier: RiskTier::Low,
            confidence: 0.5,
            model_version: "2.0.0".into(),
        };
        db.insert_risk_score(&scores).await.unwrap();
        scores.timestamp = Utc::now();
        scores.overall_score = 72.0;
        scores.risk_tier = RiskTier::Medium;
        db.insert_risk_score(&scores).await.unwrap();

        let latest = db.latest_risk_score("home-1").await.unwrap().unwrap();
        assert_eq!(latest.overall_score, 72.0);
        assert_eq!(latest.risk_tier, RiskTier::Medium);
        assert_eq!(latest.water_score, 50.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_and_readers_share_the_connection() {
        let db = Arc::new(open_test_db());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    let home_id = format!("home-{}", i % 2);
                    for _ in 0..5 {
                        let water = ReadingValues::Water(WaterReading::default());
                        db.insert_reading(&make_reading(&home_id, 1, water)).await?;
                        db.recent_readings(&home_id, Duration::hours(1)).await?;
                    }
                    Ok::<_, StoreError>(())
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(db.recent_readings("home-0", Duration::hours(1)).await.unwrap().len(), 20);
        assert_eq!(db.recent_readings("home-1", Duration::hours(1)).await.unwrap().len(), 20);
    }
}
