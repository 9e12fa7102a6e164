//! Smoothing and z-scoring of normalized histograms
//!
//! The transform is a boxcar moving *sum* (the kernel is `w` ones, not `w`
//! copies of `1/w`), so smoothed values are `w` times the moving average.
//! Z-scoring is scale-invariant, which keeps the final ranking identical to a
//! normalized kernel.
//!
//! Known statistical quirk: the z-score baseline (mean and population
//! standard deviation) is computed over the *whole* smoothed series,
//! foreground included. A series with zero deviation scores 0 everywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::histogram::NormalizedHistogram;
use crate::error::{Error, Result};

/// Foreground timestamps with their z-scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub scores: Vec<f64>,
}

impl ScoreSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Moving sum over `window` consecutive samples, "valid" mode.
///
/// Output length is `values.len() - window + 1`; empty when the window is
/// zero or longer than the input.
#[must_use]
pub fn convolve_valid(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > values.len() {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>())
        .collect()
}

/// Split `dropped` edge samples into `(leading, trailing)` counts.
///
/// The leading edge gets the floor half; the trailing edge the remainder.
#[must_use]
pub fn edge_split(dropped: usize) -> (usize, usize) {
    let leading = dropped / 2;
    (leading, dropped - leading)
}

/// Trim `items` so it aligns one-to-one with a series that lost `dropped`
/// samples to a valid-mode convolution.
///
/// Returns the trimmed slice together with the `(leading, trailing)` split.
/// Requires `dropped <= items.len()`; the trimmed length is
/// `items.len() - dropped`.
#[must_use]
pub fn trim_edges<T>(items: &[T], dropped: usize) -> (&[T], usize, usize) {
    let (leading, trailing) = edge_split(dropped);
    if dropped == 0 {
        return (items, 0, 0);
    }
    (&items[leading..items.len() - trailing], leading, trailing)
}

/// Z-score each of `values` against the mean and population standard
/// deviation of `baseline`. Scores are 0 when the deviation is zero.
#[must_use]
pub fn zscores(values: &[f64], baseline: &[f64]) -> Vec<f64> {
    if baseline.is_empty() {
        return vec![0.0; values.len()];
    }
    let mean = baseline.iter().mean();
    let std_dev = baseline.iter().population_std_dev();

    values
        .iter()
        .map(|&v| {
            let z = (v - mean) / std_dev;
            if std_dev > 0.0 && z.is_finite() {
                z
            } else {
                0.0
            }
        })
        .collect()
}

/// Smooth `hist` with a `smoothing_len` moving sum and z-score the buckets
/// from `foreground_start` onwards against the whole smoothed series.
///
/// The smoothed value reported for a foreground bucket is the sum of the
/// `smoothing_len` ratios ending at that bucket. The output therefore has
/// exactly one score per foreground bucket.
///
/// # Errors
/// - [`Error::Configuration`] if `smoothing_len` is 0 or longer than the series
/// - [`Error::Lookup`] if `foreground_start` is not a bucket of the trimmed
///   series, or falls inside the smoothing warm-up
pub fn transform_score(
    hist: &NormalizedHistogram,
    foreground_start: DateTime<Utc>,
    smoothing_len: usize,
) -> Result<ScoreSeries> {
    if smoothing_len == 0 {
        return Err(Error::config("smoothing length must be at least 1"));
    }
    if smoothing_len > hist.ratios.len() {
        return Err(Error::config(format!(
            "smoothing length {smoothing_len} exceeds series length {}",
            hist.ratios.len()
        )));
    }

    let smoothed = convolve_valid(&hist.ratios, smoothing_len);
    let dropped = hist.ratios.len() - smoothed.len();
    let (trimmed, leading, trailing) = trim_edges(&hist.timestamps, dropped);
    debug_assert_eq!(trimmed.len(), smoothed.len());

    let foreground_index = trimmed
        .iter()
        .position(|&at| at == foreground_start)
        .ok_or_else(|| {
            Error::Lookup(format!(
                "foreground start {foreground_start} is not a bucket of the smoothed series"
            ))
        })?;
    let slice_start = foreground_index.checked_sub(trailing).ok_or_else(|| {
        Error::Lookup(format!(
            "foreground start {foreground_start} falls inside the smoothing warm-up"
        ))
    })?;

    Ok(ScoreSeries {
        timestamps: hist.timestamps[foreground_index + leading..].to_vec(),
        scores: zscores(&smoothed[slice_start..], &smoothed),
    })
}
