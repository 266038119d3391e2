//! Shared utility functions for AQF crates.

/// Date utility functions
pub mod dates {
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

    /// Date format used in the record store: "YYYY-MM-DD"
    pub const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Time format used in the record store: "HH:MM:SS"
    pub const TIME_FORMAT: &str = "%H:%M:%S";

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    /// Format a NaiveTime as "HH:MM:SS"
    pub fn format_time(time: &NaiveTime) -> String {
        time.format(TIME_FORMAT).to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?)
    }

    /// Parse a time string in "HH:MM:SS" format
    pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
        Ok(NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)?)
    }

    /// Convert a unix timestamp into local civil time at a fixed UTC offset.
    ///
    /// Returns `None` when the offset is out of range or the timestamp
    /// cannot be represented.
    pub fn unix_to_local(timestamp: i64, utc_offset_hours: i32) -> Option<NaiveDateTime> {
        let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
        let utc = DateTime::from_timestamp(timestamp, 0)?;
        Some(utc.with_timezone(&offset).naive_local())
    }

}

/// Wall-clock scheduling helpers for the hourly collector.
pub mod schedule {
    use chrono::{DateTime, TimeDelta, Utc};

    const SECONDS_PER_HOUR: i64 = 3600;

    /// The next top-of-the-hour boundary strictly after `now`.
    ///
    /// Hour boundaries are computed in UTC, which matches every whole-hour
    /// local offset.
    pub fn next_top_of_hour(now: DateTime<Utc>) -> DateTime<Utc> {
        let next = (now.timestamp().div_euclid(SECONDS_PER_HOUR) + 1) * SECONDS_PER_HOUR;
        DateTime::from_timestamp(next, 0).unwrap_or(now + TimeDelta::hours(1))
    }

    /// How long to sleep from `now` until the next top of the hour.
    pub fn duration_until_next_hour(now: DateTime<Utc>) -> std::time::Duration {
        (next_top_of_hour(now) - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }

}
