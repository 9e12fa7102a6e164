//! Test fixtures for integration tests
//!
//! A ten-day corpus with ten documents per day, dated at noon from
//! 2024-01-01. Every document contains the background term "y"; the other
//! terms follow the per-day document counts given to [`CorpusBuilder::term`].

use chrono::{DateTime, Duration, TimeZone, Utc};
use trendwatch::analysis::{Granularity, PipelineParams};
use trendwatch::corpus::{MemoryCorpus, MemoryDocument};

/// Documents per day
pub const DOCS_PER_DAY: usize = 10;

/// Days covered by the background window
pub const DAYS: usize = 10;

/// Per-day counts of a term rising over the last two days
pub const RISING: [usize; DAYS] = [1, 1, 1, 1, 1, 1, 1, 1, 5, 9];

/// Noon of day `n`
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(n)
}

/// Midnight following the last corpus day
pub fn reference_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap()
}

/// Midnight starting the three-day foreground window
pub fn foreground_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
}

/// Daily parameters: 3-day foreground, 10-day background, no smoothing
pub fn daily_params(num_cluster: usize) -> PipelineParams {
    PipelineParams {
        granularity: Granularity::Day,
        foreground_window: 3,
        background_window: 10,
        minimum_frequency_threshold: 3,
        smoothing_len: 1,
        num_cluster,
        num_trends: 10,
        ..Default::default()
    }
}

/// Builds a [`MemoryCorpus`] day by day
#[derive(Default)]
pub struct CorpusBuilder {
    terms: Vec<(&'static str, [usize; DAYS])>,
    archived: Vec<(&'static str, usize)>,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `term` appears in the first `counts[d]` documents of day `d`
    pub fn term(mut self, term: &'static str, counts: [usize; DAYS]) -> Self {
        self.terms.push((term, counts));
        self
    }

    /// `count` documents containing `term`, dated long before the background window
    pub fn archived(mut self, term: &'static str, count: usize) -> Self {
        self.archived.push((term, count));
        self
    }

    pub fn build(self) -> MemoryCorpus {
        let mut documents = Vec::new();
        for d in 0..DAYS {
            for i in 0..DOCS_PER_DAY {
                let mut terms = vec![("y", 1)];
                terms.extend(
                    self.terms
                        .iter()
                        .filter(|(_, counts)| i < counts[d])
                        .map(|(term, _)| (*term, 2)),
                );
                documents.push(MemoryDocument::new(
                    format!("d{d}-{i}"),
                    day(d as i64),
                    terms,
                ));
            }
        }
        for (term, count) in self.archived {
            for i in 0..count {
                documents.push(MemoryDocument::new(
                    format!("old-{term}-{i}"),
                    day(-60),
                    [("y", 1), (term, 1)],
                ));
            }
        }
        MemoryCorpus::new(documents)
    }
}
