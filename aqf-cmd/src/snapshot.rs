//! One-off fetch, printed to stdout. Nothing is stored.

use aqf_core::{AqiCategory, PollutionSource, Reading};
use log::info;
use std::fmt::Write;

/// Render a reading with its AQI category, one component per line.
pub fn describe(reading: &Reading) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Time:   {}", reading.timestamp());
    let _ = writeln!(
        out,
        "AQI:    {} ({})",
        reading.aqi,
        AqiCategory::from_index(reading.aqi)
    );
    let components = [
        ("PM2.5", reading.pm2_5),
        ("PM10", reading.pm10),
        ("NO2", reading.no2),
        ("SO2", reading.so2),
        ("CO", reading.co),
        ("O3", reading.o3),
    ];
    for (name, value) in components {
        let _ = writeln!(out, "{:<7} {} μg/m³", format!("{}:", name), value);
    }
    out
}

pub async fn run_snapshot<S: PollutionSource>(source: &S, utc_offset_hours: i32) -> anyhow::Result<()> {
    let measurement = source.fetch().await?;
    let (reading, warnings) = measurement.to_reading(utc_offset_hours)?;
    if !warnings.is_empty() {
        info!("{} component(s) defaulted to 0", warnings.len());
    }
    print!("{}", describe(&reading));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_describe_includes_category_and_components() {
        let reading = Reading {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            aqi: 4,
            pm10: 11,
            pm2_5: 25,
            no2: 4,
            so2: 5,
            co: 260,
            o3: 70,
        };
        let text = describe(&reading);
        assert!(text.starts_with("Time:   2024-05-01 10:00:00\n"));
        assert!(text.contains("AQI:    4 (Unhealthy)"));
        assert!(text.contains("PM2.5:  25 μg/m³"));
        assert!(text.contains("CO:     260 μg/m³"));
        assert_eq!(text.lines().count(), 8);
    }
}
