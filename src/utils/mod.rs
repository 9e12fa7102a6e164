//! Common utilities and helper functions
//!
//! Date parsing shared by the configuration layer, the command line and the
//! search backend adapter.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts, in order of preference:
/// - RFC 3339 with an offset or `Z` (`2015-02-05T08:47:22.01Z`)
/// - a naive date-time with optional fractional seconds (`2015-02-05T08:47:22.01`),
///   interpreted as UTC
/// - a bare date (`2015-02-05`), interpreted as UTC midnight
pub fn parse_iso_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid ISO-8601 date: {input}"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Midnight does not exist for date")?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Convert backend epoch milliseconds into a UTC timestamp
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
