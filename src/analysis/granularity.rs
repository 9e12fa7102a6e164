//! Time-bucket units
//!
//! A [`Granularity`] names the bucket size used both for window arithmetic
//! (`reference_date - n * duration`) and for requesting date histograms from
//! the search backend, which understands the same lowercase names.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Fixed-size histogram bucket unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    /// 730 hours
    Month,
    /// 8760 hours
    Year,
}

impl Granularity {
    /// All granularities, finest first
    pub const ALL: [Granularity; 7] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Year,
    ];

    /// Fixed duration of one bucket
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Second => Duration::seconds(1),
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
            Self::Month => Duration::hours(730),
            Self::Year => Duration::hours(8760),
        }
    }

    /// Name understood by the backend's `date_histogram` interval
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Start of the calendar bucket containing `at`.
    ///
    /// Weeks start on Monday, months and years on their first day, matching
    /// the backend's calendar bucketing.
    #[must_use]
    pub fn truncate(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = at.date_naive();
        let midnight = |d: chrono::NaiveDate| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN));

        match self {
            Self::Second => at.with_nanosecond(0).unwrap_or(at),
            Self::Minute => Utc
                .with_ymd_and_hms(at.year(), at.month(), at.day(), at.hour(), at.minute(), 0)
                .single()
                .unwrap_or(at),
            Self::Hour => Utc
                .with_ymd_and_hms(at.year(), at.month(), at.day(), at.hour(), 0, 0)
                .single()
                .unwrap_or(at),
            Self::Day => midnight(date),
            Self::Week => {
                let offset = i64::from(date.weekday().num_days_from_monday());
                midnight(date - Duration::days(offset))
            }
            Self::Month => midnight(date.with_day(1).unwrap_or(date)),
            Self::Year => midnight(date.with_ordinal(1).unwrap_or(date)),
        }
    }

    /// Start of the calendar bucket following the one that starts at `bucket`
    #[must_use]
    pub fn next_bucket(&self, bucket: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Month => bucket
                .checked_add_months(Months::new(1))
                .unwrap_or(bucket + self.duration()),
            Self::Year => bucket
                .checked_add_months(Months::new(12))
                .unwrap_or(bucket + self.duration()),
            _ => bucket + self.duration(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::config(format!("unknown granularity '{s}'")))
    }
}
