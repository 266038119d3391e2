use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Number of pollutant features fed to the forecasting model.
pub const FEATURE_COUNT: usize = 7;

/// Feature column names, in model order.
///
/// Note this differs from the column order of the record store file.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["AQI", "PM2.5", "PM10", "NO2", "SO2", "CO", "O3"];

/// One row of the feature matrix, ordered as [`FEATURE_NAMES`].
pub type FeatureVector = [f64; FEATURE_COUNT];

/// The identity of a reading: a calendar date and an hour of day.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct HourSlot {
    pub date: NaiveDate,
    pub hour: u32,
}

/// A single hourly air quality reading in local civil time.
///
/// All pollutant concentrations are whole numbers (µg/m³), `aqi` is the
/// 1..5 index reported by the source.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Reading {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub aqi: u32,
    pub pm10: u32,
    pub pm2_5: u32,
    pub no2: u32,
    pub so2: u32,
    pub co: u32,
    pub o3: u32,
}

impl Reading {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn slot(&self) -> HourSlot {
        HourSlot {
            date: self.date,
            hour: self.time.hour(),
        }
    }

    /// The model feature vector, ordered as [`FEATURE_NAMES`].
    pub fn features(&self) -> FeatureVector {
        [
            self.aqi as f64,
            self.pm2_5 as f64,
            self.pm10 as f64,
            self.no2 as f64,
            self.so2 as f64,
            self.co as f64,
            self.o3 as f64,
        ]
    }
}
