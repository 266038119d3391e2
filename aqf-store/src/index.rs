//! In-memory SQLite index over the readings of one store snapshot.
//!
//! The CSV file is the durable log; this index answers dedup lookups and
//! returns readings in timestamp order regardless of file order.

use crate::schema;
use aqf_core::{HourSlot, Reading};
use aqf_utils::dates::{format_date, format_time, DATE_FORMAT, TIME_FORMAT};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

pub struct ReadingIndex {
    conn: Connection,
}

fn parse_column<T, E>(idx: usize, result: Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl ReadingIndex {
    pub fn new() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::create_schema())?;
        Ok(Self { conn })
    }

    /// Insert a reading unless its hour slot is already indexed.
    ///
    /// Returns `true` when the reading was inserted.
    pub fn insert(&self, reading: &Reading) -> rusqlite::Result<bool> {
        let slot = reading.slot();
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO readings (date, hour, time, aqi, pm10, pm2_5, no2, so2, co, o3)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                format_date(&slot.date),
                slot.hour,
                format_time(&reading.time),
                reading.aqi,
                reading.pm10,
                reading.pm2_5,
                reading.no2,
                reading.so2,
                reading.co,
                reading.o3,
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn contains(&self, slot: &HourSlot) -> rusqlite::Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM readings WHERE date = ?1 AND hour = ?2)",
            params![format_date(&slot.date), slot.hour],
            |row| row.get(0),
        )
    }

    pub fn len(&self) -> rusqlite::Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> rusqlite::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All readings ordered by date then time.
    pub fn ordered(&self) -> rusqlite::Result<Vec<Reading>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, time, aqi, pm10, pm2_5, no2, so2, co, o3
             FROM readings
             ORDER BY date, time",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(0)?;
                let time: String = row.get(1)?;
                Ok(Reading {
                    date: parse_column(0, NaiveDate::parse_from_str(&date, DATE_FORMAT))?,
                    time: parse_column(1, NaiveTime::parse_from_str(&time, TIME_FORMAT))?,
                    aqi: row.get(2)?,
                    pm10: row.get(3)?,
                    pm2_5: row.get(4)?,
                    no2: row.get(5)?,
                    so2: row.get(6)?,
                    co: row.get(7)?,
                    o3: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("index: ordered read returned {} readings", rows.len());
        Ok(rows)
    }
}
