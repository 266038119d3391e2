//! Raw air pollution payloads as returned by the OpenWeatherMap API.
//!
//! A response looks like:
//!
//! ```text
//! {"coord":{"lon":39.7187,"lat":47.2225},
//!  "list":[{"main":{"aqi":2},
//!           "components":{"co":260.35,"no":0.1,"no2":4.2,"o3":70.1,"so2":5.3,
//!                         "pm2_5":25.4,"pm10":10.2,"nh3":1.1},
//!           "dt":1714546800}]}
//! ```
//!
//! Only the first entry of `list` is used.

use crate::error::{CoercionWarning, FetchError};
use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct PollutionResponse {
    #[serde(default)]
    pub list: Vec<Measurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainIndex {
    #[serde(default)]
    pub aqi: Value,
}

/// One measurement entry: a unix timestamp, the overall index and a map of
/// named pollutant concentrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub dt: i64,
    pub main: MainIndex,
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
}

/// Parse a response body and return its first measurement.
pub fn parse_pollution_body(body: &str) -> Result<Measurement, FetchError> {
    let response: PollutionResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Source(format!("malformed payload: {}", e)))?;
    response
        .list
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Source("no measurements in payload".to_string()))
}

/// Round a concentration to a non-negative whole number, ties to even.
fn to_count(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round_ties_even().clamp(0.0, u32::MAX as f64) as u32)
}

/// Coerce a textual pollutant value, falling back to 0 when it is not numeric.
pub fn coerce_str(field: &'static str, raw: &str) -> (u32, Option<CoercionWarning>) {
    match raw.trim().parse::<f64>().ok().and_then(to_count) {
        Some(v) => (v, None),
        None => (
            0,
            Some(CoercionWarning {
                field,
                raw: Some(raw.to_string()),
            }),
        ),
    }
}

fn coerce_json(field: &'static str, raw: Option<&Value>) -> (u32, Option<CoercionWarning>) {
    match raw {
        Some(Value::Number(n)) => match n.as_f64().and_then(to_count) {
            Some(v) => (v, None),
            None => (
                0,
                Some(CoercionWarning {
                    field,
                    raw: Some(n.to_string()),
                }),
            ),
        },
        Some(Value::String(s)) => coerce_str(field, s),
        Some(Value::Null) | None => (0, Some(CoercionWarning { field, raw: None })),
        Some(other) => (
            0,
            Some(CoercionWarning {
                field,
                raw: Some(other.to_string()),
            }),
        ),
    }
}

impl Measurement {
    /// Convert into a [`Reading`] in local time at `utc_offset_hours`.
    ///
    /// Non-numeric or missing pollutant values become 0 and are reported as
    /// [`CoercionWarning`]s rather than failing the conversion.
    pub fn to_reading(
        &self,
        utc_offset_hours: i32,
    ) -> Result<(Reading, Vec<CoercionWarning>), FetchError> {
        let local = aqf_utils::dates::unix_to_local(self.dt, utc_offset_hours).ok_or_else(|| {
            FetchError::Source(format!("timestamp {} out of range", self.dt))
        })?;

        let mut warnings = Vec::new();
        let mut take = |field: &'static str, raw: Option<&Value>| {
            let (value, warning) = coerce_json(field, raw);
            if let Some(w) = warning {
                log::warn!("{}", w);
                warnings.push(w);
            }
            value
        };

        let aqi = take("aqi", Some(&self.main.aqi));
        let pm10 = take("pm10", self.components.get("pm10"));
        let pm2_5 = take("pm2_5", self.components.get("pm2_5"));
        let no2 = take("no2", self.components.get("no2"));
        let so2 = take("so2", self.components.get("so2"));
        let co = take("co", self.components.get("co"));
        let o3 = take("o3", self.components.get("o3"));

        let reading = Reading {
            date: local.date(),
            time: local.time(),
            aqi,
            pm10,
            pm2_5,
            no2,
            so2,
            co,
            o3,
        };
        Ok((reading, warnings))
    }
}
