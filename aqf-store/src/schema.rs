//! SQL schema for the in-memory read index.

/// Returns the index schema as a single batch string.
///
/// `readings` mirrors the CSV columns plus an `hour` column. The primary key
/// on `(date, hour)` is the dedup identity of a reading.
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        date TEXT NOT NULL,
        hour INTEGER NOT NULL,
        time TEXT NOT NULL,
        aqi INTEGER NOT NULL,
        pm10 INTEGER NOT NULL,
        pm2_5 INTEGER NOT NULL,
        no2 INTEGER NOT NULL,
        so2 INTEGER NOT NULL,
        co INTEGER NOT NULL,
        o3 INTEGER NOT NULL,
        PRIMARY KEY (date, hour)
    );
    CREATE INDEX IF NOT EXISTS idx_readings_time ON readings(date, time);
    "#
}
