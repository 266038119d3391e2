//! Parsing of the record store CSV file.
//!
//! # CSV Format
//!
//! ```text
//! Date,Time,AQI,PM10,PM2.5,NO2,SO2,CO,O3
//! 2024-05-01,10:00:00,2,11,25,4,5,260,70
//! ```

use aqf_core::measurement::coerce_str;
use aqf_core::Reading;
use aqf_utils::dates::{DATE_FORMAT, TIME_FORMAT};
use chrono::{NaiveDate, NaiveTime};

/// Header row of the record store file.
pub const HEADER: [&str; 9] = ["Date", "Time", "AQI", "PM10", "PM2.5", "NO2", "SO2", "CO", "O3"];

/// Counters reported after loading a snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    /// Rows without a parseable date or time.
    pub skipped: usize,
    /// Pollutant cells that were not numeric and were read as 0.
    pub coerced: usize,
}

/// Cut `content` back to its last complete line.
///
/// A row is written with a single append, so anything after the final
/// newline is a write still in flight (or torn by a crash).
pub fn complete_lines(content: &str) -> &str {
    match content.rfind('\n') {
        Some(pos) => &content[..=pos],
        None => "",
    }
}

/// Parse a store snapshot into readings, in file order.
pub fn parse_readings(content: &str) -> Result<(Vec<Reading>, LoadStats), csv::Error> {
    let mut stats = LoadStats::default();
    let mut readings = Vec::new();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(complete_lines(content).as_bytes());

    for result in rdr.records() {
        let r = result?;
        let date = NaiveDate::parse_from_str(r.get(0).unwrap_or("").trim(), DATE_FORMAT);
        let time = NaiveTime::parse_from_str(r.get(1).unwrap_or("").trim(), TIME_FORMAT);
        let (date, time) = match (date, time) {
            (Ok(d), Ok(t)) => (d, t),
            _ => {
                log::warn!(
                    "skipping store row {}: unparseable date/time",
                    r.position().map_or(0, |p| p.line())
                );
                stats.skipped += 1;
                continue;
            }
        };

        let mut value = |idx: usize| {
            let (v, warning) = coerce_str(HEADER[idx], r.get(idx).unwrap_or(""));
            if let Some(w) = warning {
                log::warn!("store row {}: {}", r.position().map_or(0, |p| p.line()), w);
                stats.coerced += 1;
            }
            v
        };

        readings.push(Reading {
            date,
            time,
            aqi: value(2),
            pm10: value(3),
            pm2_5: value(4),
            no2: value(5),
            so2: value(6),
            co: value(7),
            o3: value(8),
        });
        stats.loaded += 1;
    }
    Ok((readings, stats))
}

/// Serialize a single reading as one CSV row, newline included.
pub fn encode_row(reading: &Reading) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        aqf_utils::dates::format_date(&reading.date),
        aqf_utils::dates::format_time(&reading.time),
        reading.aqi.to_string(),
        reading.pm10.to_string(),
        reading.pm2_5.to_string(),
        reading.no2.to_string(),
        reading.so2.to_string(),
        reading.co.to_string(),
        reading.o3.to_string(),
    ])?;
    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// The header row, newline included.
pub fn encode_header() -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADER)?;
    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}
