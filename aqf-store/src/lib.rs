//! Durable record store for hourly air quality readings.
//!
//! # Architecture
//!
//! - The CSV file is an append-only log with a fixed header
//!   (see [`loader::HEADER`]). Each row is written with one `write_all` on an
//!   append-mode handle, followed by `sync_data`.
//! - Opening a store takes a snapshot of the file (complete lines only) and
//!   loads it into an in-memory SQLite [`index::ReadingIndex`], which serves
//!   dedup checks and ordered reads.
//! - A [`checkpoint::Checkpoint`] records the unix timestamp of the last
//!   appended measurement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use aqf_store::{AppendOutcome, RecordStore};
//!
//! # fn demo(reading: aqf_core::Reading) -> Result<(), aqf_store::StoreError> {
//! let mut store = RecordStore::open("air_quality_history.csv")?;
//! match store.append(&reading)? {
//!     AppendOutcome::Written => {}
//!     AppendOutcome::Duplicate => {}
//! }
//! let history = store.readings()?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
mod error;
pub mod index;
pub mod loader;
pub mod schema;

pub use checkpoint::Checkpoint;
pub use error::StoreError;

use aqf_core::{HourSlot, Reading};
use index::ReadingIndex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Result of appending a reading.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AppendOutcome {
    Written,
    /// A reading for the same date and hour already exists; nothing was written.
    Duplicate,
}

pub struct RecordStore {
    path: PathBuf,
    index: ReadingIndex,
}

impl RecordStore {
    /// Open a store for writing, creating the file with its header if needed.
    ///
    /// A torn trailing row left by an interrupted write is truncated so the
    /// next append starts on a fresh line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            fs::write(&path, loader::encode_header()?)?;
            log::info!("created record store {}", path.display());
        } else {
            repair_torn_tail(&path)?;
        }
        Self::load(path)
    }

    /// Open an existing store read-only, taking a snapshot of its current rows.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::load(path.as_ref().to_path_buf())
    }

    fn load(path: PathBuf) -> Result<Self, StoreError> {
        let content = fs::read_to_string(&path)?;
        let (readings, stats) = loader::parse_readings(&content)?;
        let index = ReadingIndex::new()?;
        let mut duplicates = 0usize;
        for reading in &readings {
            if !index.insert(reading)? {
                duplicates += 1;
            }
        }
        log::info!(
            "loaded {} readings from {} (skipped {}, coerced {}, duplicate slots {})",
            stats.loaded,
            path.display(),
            stats.skipped,
            stats.coerced,
            duplicates
        );
        Ok(Self { path, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.index.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.index.is_empty()?)
    }

    pub fn contains_slot(&self, slot: &HourSlot) -> Result<bool, StoreError> {
        Ok(self.index.contains(slot)?)
    }

    /// Append `reading` unless its `(date, hour)` slot is already recorded.
    pub fn append(&mut self, reading: &Reading) -> Result<AppendOutcome, StoreError> {
        if self.index.contains(&reading.slot())? {
            return Ok(AppendOutcome::Duplicate);
        }
        let row = loader::encode_row(reading)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&row)?;
        file.sync_data()?;
        self.index.insert(reading)?;
        Ok(AppendOutcome::Written)
    }

    /// All readings, ascending by date and time.
    pub fn readings(&self) -> Result<Vec<Reading>, StoreError> {
        Ok(self.index.ordered()?)
    }
}

fn repair_torn_tail(path: &Path) -> Result<(), StoreError> {
    let content = fs::read_to_string(path)?;
    let complete = loader::complete_lines(&content);
    if complete.len() == content.len() {
        return Ok(());
    }
    log::warn!(
        "truncating {} bytes of incomplete row at end of {}",
        content.len() - complete.len(),
        path.display()
    );
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(complete.len() as u64)?;
    file.sync_all()?;
    if complete.is_empty() {
        fs::write(path, loader::encode_header()?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn reading(day: u32, hour: u32, minute: u32) -> Reading {
        Reading {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            aqi: 2,
            pm10: 11,
            pm2_5: 25,
            no2: 4,
            so2: 5,
            co: 260,
            o3: 70,
        }
    }

    #[test]
    fn test_open_creates_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        RecordStore::open(&path).unwrap();
        RecordStore::open(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Date,Time,AQI,PM10,PM2.5,NO2,SO2,CO,O3\n"
        );
    }

    #[test]
    fn test_duplicate_hour_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut store = RecordStore::open(&path).unwrap();
        assert_eq!(store.append(&reading(1, 10, 0)).unwrap(), AppendOutcome::Written);
        assert_eq!(
            store.append(&reading(1, 10, 20)).unwrap(),
            AppendOutcome::Duplicate
        );
        assert_eq!(store.len().unwrap(), 1);

        let reopened = RecordStore::open_existing(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn test_dedup_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        RecordStore::open(&path)
            .unwrap()
            .append(&reading(1, 10, 0))
            .unwrap();
        let mut store = RecordStore::open(&path).unwrap();
        assert_eq!(
            store.append(&reading(1, 10, 5)).unwrap(),
            AppendOutcome::Duplicate
        );
        assert_eq!(store.append(&reading(1, 11, 0)).unwrap(), AppendOutcome::Written);
        assert_eq!(store.readings().unwrap().len(), 2);
    }

    #[test]
    fn test_readings_sorted_even_when_file_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        fs::write(
            &path,
            "Date,Time,AQI,PM10,PM2.5,NO2,SO2,CO,O3
2024-05-02,01:00:00,3,1,1,1,1,1,1
2024-05-01,09:00:00,1,1,1,1,1,1,1
2024-05-01,23:00:00,2,1,1,1,1,1,1
",
        )
        .unwrap();
        let store = RecordStore::open_existing(&path).unwrap();
        let aqis: Vec<u32> = store.readings().unwrap().iter().map(|r| r.aqi).collect();
        assert_eq!(aqis, vec![1, 2, 3]);
    }

    #[test]
    fn test_open_repairs_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        fs::write(
            &path,
            "Date,Time,AQI,PM10,PM2.5,NO2,SO2,CO,O3
2024-05-01,09:00:00,1,1,1,1,1,1,1
2024-05-01,10:0",
        )
        .unwrap();

        let snapshot = RecordStore::open_existing(&path).unwrap();
        assert_eq!(snapshot.len().unwrap(), 1);

        let mut store = RecordStore::open(&path).unwrap();
        store.append(&reading(1, 10, 0)).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Date,Time,AQI,PM10,PM2.5,NO2,SO2,CO,O3
2024-05-01,09:00:00,1,1,1,1,1,1,1
2024-05-01,10:00:00,2,11,25,4,5,260,70
"
        );
    }

    #[test]
    fn test_open_existing_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = RecordStore::open_existing(dir.path().join("missing.csv"));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
