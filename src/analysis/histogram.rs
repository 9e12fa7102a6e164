//! Date histograms and their normalization against a reference histogram
//!
//! A term's histogram only spans the buckets between its first and last
//! occurrence, while the reference (corpus-wide) histogram spans the whole
//! queried range. [`normalize`] pads the term's counts to the reference's
//! extent and divides bucket-wise, so every term ends up expressed as a share
//! of the corpus volume in each bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ascending bucket timestamps with their document counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    timestamps: Vec<DateTime<Utc>>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Build a histogram, checking that both sequences have the same length
    /// and that timestamps are strictly ascending.
    pub fn new(timestamps: Vec<DateTime<Utc>>, counts: Vec<u64>) -> Result<Self> {
        if timestamps.len() != counts.len() {
            return Err(Error::contract(format!(
                "histogram has {} timestamps but {} counts",
                timestamps.len(),
                counts.len()
            )));
        }

        if let Some(pair) = timestamps.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(Error::contract(format!(
                "histogram buckets not strictly ascending: {} then {}",
                pair[0], pair[1]
            )));
        }

        Ok(Self { timestamps, counts })
    }

    /// Build a histogram from `(bucket, count)` pairs
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (DateTime<Utc>, u64)>,
    {
        let (timestamps, counts) = pairs.into_iter().unzip();
        Self::new(timestamps, counts)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    #[must_use]
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }
}

/// A histogram expressed as per-bucket ratios to a reference histogram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHistogram {
    pub timestamps: Vec<DateTime<Utc>>,
    pub ratios: Vec<f64>,
}

impl NormalizedHistogram {
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Element-wise division that yields 0 wherever the quotient is undefined
/// or not finite.
#[must_use]
pub fn safe_divide(numerators: &[f64], denominators: &[f64]) -> Vec<f64> {
    numerators
        .iter()
        .zip(denominators)
        .map(|(&n, &d)| {
            let ratio = n / d;
            if ratio.is_finite() {
                ratio
            } else {
                0.0
            }
        })
        .collect()
}

/// Align `hist` to `reference` and divide bucket-wise.
///
/// The result carries the reference's timestamps. Fails with
/// [`Error::Alignment`] when `hist` is empty or its buckets are not a
/// contiguous run of the reference's buckets.
pub fn normalize(hist: &Histogram, reference: &Histogram) -> Result<NormalizedHistogram> {
    let (Some(first), Some(last)) = (hist.timestamps.first(), hist.timestamps.last()) else {
        return Err(Error::Alignment("cannot align an empty histogram".into()));
    };

    let position = |at: &DateTime<Utc>| {
        reference
            .timestamps
            .binary_search(at)
            .map_err(|_| Error::Alignment(format!("bucket {at} missing from reference histogram")))
    };
    let before = position(first)?;
    let end = position(last)?;

    if reference.timestamps[before..=end] != hist.timestamps[..] {
        return Err(Error::Alignment(format!(
            "histogram buckets between {first} and {last} do not match the reference"
        )));
    }

    let after = reference.len() - end - 1;
    let padded: Vec<f64> = std::iter::repeat(0.0)
        .take(before)
        .chain(hist.counts.iter().map(|&c| c as f64))
        .chain(std::iter::repeat(0.0).take(after))
        .collect();
    let denominators: Vec<f64> = reference.counts.iter().map(|&c| c as f64).collect();

    Ok(NormalizedHistogram {
        timestamps: reference.timestamps.clone(),
        ratios: safe_divide(&padded, &denominators),
    })
}
