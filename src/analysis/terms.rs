//! Term aggregation over a sample of documents
//!
//! Per-document term vectors are fetched in batches and merged into one
//! [`TermStats`] per distinct term. The corpus-wide totals are taken from the
//! first document in which a term is seen and are not accumulated afterwards:
//! the backend only provides them per document, so they stay an estimate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{CorpusReader, DocumentTerms};
use crate::error::{Error, Result};

/// Default number of identifiers per term-vector request
pub const DEFAULT_TERM_VECTOR_BATCH: usize = 100;

/// Aggregate statistics of a term over the sampled documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TermStats {
    /// Occurrences summed over the sampled documents
    pub term_freq: u64,
    /// Sampled documents containing the term
    pub doc_freq: u64,
    /// Backend estimate of the term's total occurrences
    pub term_total: u64,
    /// Backend estimate of the documents containing the term
    pub doc_total: u64,
}

impl TermStats {
    /// Share of the term's documents that fall in the sample.
    ///
    /// Zero when the backend reported no total.
    #[must_use]
    pub fn recency(&self) -> f64 {
        if self.doc_total == 0 {
            0.0
        } else {
            self.doc_freq as f64 / self.doc_total as f64
        }
    }
}

/// Per-term statistics, ordered by term
pub type TermTable = BTreeMap<String, TermStats>;

/// Merge one document's term vector into `table`
pub fn merge_document(table: &mut TermTable, document: &DocumentTerms) {
    for (term, entry) in document {
        table
            .entry(term.clone())
            .and_modify(|stats| {
                stats.term_freq += entry.term_freq;
                stats.doc_freq += 1;
            })
            .or_insert(TermStats {
                term_freq: entry.term_freq,
                doc_freq: 1,
                term_total: entry.term_total_estimate,
                doc_total: entry.doc_total_estimate,
            });
    }
}

/// Fetch term vectors for `ids` in batches of `batch_size` and merge them.
///
/// Documents are merged in the order of `ids`, so "first observation" means
/// the earliest identifier containing the term.
///
/// # Errors
/// [`Error::BackendContractViolation`] when a batch answer does not contain
/// exactly one entry per requested identifier.
pub async fn aggregate_terms<C>(reader: &C, ids: &[String], batch_size: usize) -> Result<TermTable>
where
    C: CorpusReader + ?Sized,
{
    let mut table = TermTable::new();
    if ids.is_empty() {
        return Ok(table);
    }
    if batch_size == 0 {
        return Err(Error::config("term vector batch size must be at least 1"));
    }

    debug!(ids = ids.len(), batch_size, "retrieving term vectors");

    for batch in ids.chunks(batch_size) {
        let vectors = reader.term_vectors(batch).await?;
        if vectors.len() != batch.len() {
            return Err(Error::contract(format!(
                "requested term vectors for {} documents, received {}",
                batch.len(),
                vectors.len()
            )));
        }

        for id in batch {
            let document = vectors.get(id).ok_or_else(|| {
                Error::contract(format!("term vectors missing for document {id}"))
            })?;
            merge_document(&mut table, document);
        }
    }

    Ok(table)
}

/// Drop terms seen in fewer than `min_doc_freq` documents and sort the rest by
/// descending `doc_freq`.
///
/// The sort is stable over the table's alphabetical order, so terms with equal
/// document frequency come out alphabetically.
#[must_use]
pub fn threshold_sort(table: TermTable, min_doc_freq: u64) -> Vec<(String, TermStats)> {
    if table.is_empty() {
        return Vec::new();
    }
    debug!(terms = table.len(), min_doc_freq, "thresholding terms");

    let mut kept: Vec<_> = table
        .into_iter()
        .filter(|(_, stats)| stats.doc_freq >= min_doc_freq)
        .collect();
    kept.sort_by(|a, b| b.1.doc_freq.cmp(&a.1.doc_freq));
    kept
}
