//! Corpus Reader contract
//!
//! The trend pipeline never talks to a search engine directly. It consumes the
//! three read operations of [`CorpusReader`], injected into the
//! [`TrendsDetector`](crate::analysis::TrendsDetector) at construction:
//!
//! - [`list_ids`](CorpusReader::list_ids) - identifiers of documents that carry
//!   the analysis field and fall into a date range
//! - [`term_vectors`](CorpusReader::term_vectors) - per-document term statistics
//! - [`date_histogram`](CorpusReader::date_histogram) - date-bucketed document
//!   counts, optionally restricted to documents matching a term
//!
//! # Implementations
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        TrendsDetector        │
//! └──────────────────────────────┘
//!                │
//!                ▼
//! ┌──────────────────────────────┐
//! │     CorpusReader (trait)     │
//! └──────────────────────────────┘
//!          │             │
//!          ▼             ▼
//! ┌────────────────┐ ┌────────────────┐
//! │OpenSearchCorpus│ │  MemoryCorpus  │
//! └────────────────┘ └────────────────┘
//! ```

pub mod memory;
pub mod opensearch;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::granularity::Granularity;
use crate::analysis::histogram::Histogram;
use crate::error::Result;

pub use self::memory::{MemoryCorpus, MemoryDocument};
pub use self::opensearch::OpenSearchCorpus;

/// Half-open date range `(start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Exclusive lower bound
    pub start: DateTime<Utc>,
    /// Inclusive upper bound
    pub end: DateTime<Utc>,
}

impl DateRange {
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `at` falls inside `(start, end]`
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at <= self.end
    }
}

/// Statistics of one term inside one document, as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TermVectorEntry {
    /// Occurrences of the term inside the document
    pub term_freq: u64,
    /// Backend estimate of the number of documents containing the term
    pub doc_freq_estimate: u64,
    /// Backend estimate of the total occurrences of the term
    pub term_total_estimate: u64,
    /// Backend estimate used as the recency denominator
    pub doc_total_estimate: u64,
}

/// Term vectors of one document, keyed by term
pub type DocumentTerms = HashMap<String, TermVectorEntry>;

/// Term vectors of a batch of documents, keyed by document identifier
pub type TermVectors = HashMap<String, DocumentTerms>;

/// Read contract of the document store
#[async_trait]
pub trait CorpusReader: Send + Sync {
    /// Identifiers of documents having the analysis field and a date in `range`
    async fn list_ids(&self, range: DateRange) -> Result<Vec<String>>;

    /// Term statistics of the analysis field for each requested identifier.
    ///
    /// Documents without term vectors are simply absent from the result.
    async fn term_vectors(&self, ids: &[String]) -> Result<TermVectors>;

    /// Document counts bucketed by `granularity` over `range`, restricted to
    /// documents matching `term` when given. Empty when nothing matches.
    async fn date_histogram(
        &self,
        range: DateRange,
        granularity: Granularity,
        term: Option<&str>,
    ) -> Result<Histogram>;
}
