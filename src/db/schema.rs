use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS carriers (
            carrier_id     TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            webhook_url    TEXT,
            webhook_secret TEXT
        );

        CREATE TABLE IF NOT EXISTS homes (
            home_id       TEXT PRIMARY KEY,
            carrier_id    TEXT NOT NULL,
            policy_number TEXT NOT NULL,
            active        INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS readings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            ts          TEXT NOT NULL, -- RFC 3339 UTC
            home_id     TEXT NOT NULL,
            sensor_id   TEXT NOT NULL,
            sensor_type TEXT NOT NULL,
            reading     TEXT NOT NULL  -- JSON
        );

        CREATE TABLE IF NOT EXISTS events (
            event_id    TEXT PRIMARY KEY,
            ts          TEXT NOT NULL,
            home_id     TEXT NOT NULL,
            event_type  TEXT NOT NULL,
            severity    TEXT NOT NULL,
            event       TEXT NOT NULL  -- JSON
        );

        CREATE TABLE IF NOT EXISTS risk_scores (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            ts               TEXT NOT NULL,
            home_id          TEXT NOT NULL,
            water_score      REAL NOT NULL,
            gas_score        REAL NOT NULL,
            structural_score REAL NOT NULL,
            hvac_score       REAL NOT NULL,
            air_score        REAL NOT NULL,
            energy_score     REAL NOT NULL,
            fire_score       REAL NOT NULL,
            overall_score    REAL NOT NULL,
            risk_tier        TEXT NOT NULL,
            confidence       REAL NOT NULL,
            model_version    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_readings_home_ts ON readings(home_id, ts DESC);
        CREATE INDEX IF NOT EXISTS idx_events_home_ts ON events(home_id, ts DESC);
        CREATE INDEX IF NOT EXISTS idx_risk_scores_home_ts ON risk_scores(home_id, ts DESC);
        ",
    )?;
    Ok(())
}
