//! In-memory corpus
//!
//! Answers the [`CorpusReader`] reads from a vector of documents, with the
//! same shapes the search backend produces: term statistics are computed over
//! the whole corpus, and histograms are zero-filled between their first and
//! last populated bucket.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CorpusReader, DateRange, DocumentTerms, TermVectorEntry, TermVectors};
use crate::analysis::granularity::Granularity;
use crate::analysis::histogram::Histogram;
use crate::error::Result;

/// A dated document with the term counts of its analysis field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDocument {
    pub id: String,
    pub date: DateTime<Utc>,
    /// Term occurrences; empty when the document lacks the analysis field
    pub terms: HashMap<String, u64>,
}

impl MemoryDocument {
    pub fn new<'a>(
        id: impl Into<String>,
        date: DateTime<Utc>,
        terms: impl IntoIterator<Item = (&'a str, u64)>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            terms: terms
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(term, count)| (term.to_string(), count))
                .collect(),
        }
    }

    fn has_analysis_field(&self) -> bool {
        !self.terms.is_empty()
    }
}

/// Corpus reader over documents held in memory
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    documents: Vec<MemoryDocument>,
    term_vector_requests: AtomicUsize,
}

impl MemoryCorpus {
    pub fn new(documents: Vec<MemoryDocument>) -> Self {
        Self {
            documents,
            term_vector_requests: AtomicUsize::new(0),
        }
    }

    pub fn push(&mut self, document: MemoryDocument) {
        self.documents.push(document);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of `term_vectors` calls answered so far
    #[must_use]
    pub fn term_vector_requests(&self) -> usize {
        self.term_vector_requests.load(Ordering::Relaxed)
    }

    /// Corpus-wide `(doc_freq, total_term_freq)` of `term`
    fn corpus_stats(&self, term: &str) -> (u64, u64) {
        self.documents
            .iter()
            .filter_map(|doc| doc.terms.get(term))
            .fold((0, 0), |(docs, total), &count| (docs + 1, total + count))
    }
}

#[async_trait]
impl CorpusReader for MemoryCorpus {
    async fn list_ids(&self, range: DateRange) -> Result<Vec<String>> {
        Ok(self
            .documents
            .iter()
            .filter(|doc| doc.has_analysis_field() && range.contains(doc.date))
            .map(|doc| doc.id.clone())
            .collect())
    }

    async fn term_vectors(&self, ids: &[String]) -> Result<TermVectors> {
        self.term_vector_requests.fetch_add(1, Ordering::Relaxed);

        let by_id: HashMap<&str, &MemoryDocument> = self
            .documents
            .iter()
            .map(|doc| (doc.id.as_str(), doc))
            .collect();

        let mut vectors = TermVectors::new();
        for id in ids {
            let Some(doc) = by_id.get(id.as_str()).filter(|d| d.has_analysis_field()) else {
                continue;
            };
            let terms: DocumentTerms = doc
                .terms
                .iter()
                .map(|(term, &count)| {
                    let (doc_freq, total) = self.corpus_stats(term);
                    let entry = TermVectorEntry {
                        term_freq: count,
                        doc_freq_estimate: doc_freq,
                        term_total_estimate: total,
                        doc_total_estimate: doc_freq,
                    };
                    (term.clone(), entry)
                })
                .collect();
            vectors.insert(id.clone(), terms);
        }
        Ok(vectors)
    }

    async fn date_histogram(
        &self,
        range: DateRange,
        granularity: Granularity,
        term: Option<&str>,
    ) -> Result<Histogram> {
        let mut buckets: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
        for doc in &self.documents {
            if !range.contains(doc.date) {
                continue;
            }
            if let Some(term) = term {
                if !doc.terms.contains_key(term) {
                    continue;
                }
            }
            *buckets.entry(granularity.truncate(doc.date)).or_default() += 1;
        }

        let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back())
        else {
            return Ok(Histogram::empty());
        };

        let mut pairs = Vec::new();
        let mut bucket = first;
        while bucket <= last {
            pairs.push((bucket, buckets.get(&bucket).copied().unwrap_or(0)));
            bucket = granularity.next_bucket(bucket);
        }
        Histogram::from_pairs(pairs)
    }
}
