//! Trending-cluster selection
//!
//! Candidates are clustered on their score vectors. The trending cluster is
//! the one whose centroid contains the single steepest step between
//! consecutive buckets: an accelerating shape, not merely a high level. When
//! every shape is falling, the one falling most gently still wins.

use tracing::debug;

use super::kmeans::KMeans;
use crate::error::Result;

/// Largest difference between consecutive elements, if there is at least one
#[must_use]
pub fn max_step(values: &[f64]) -> Option<f64> {
    values
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .max_by(f64::total_cmp)
}

/// Index of the centroid with the steepest step, even when that step is
/// negative.
///
/// `None` only when every centroid is flat (each steepest step is exactly 0)
/// or no centroid has two elements. Ties go to the lowest index.
#[must_use]
pub fn trending_cluster(centroids: &[Vec<f64>]) -> Option<usize> {
    let steps: Vec<(usize, f64)> = centroids
        .iter()
        .enumerate()
        .filter_map(|(index, centroid)| max_step(centroid).map(|step| (index, step)))
        .collect();
    if steps.iter().all(|&(_, step)| step == 0.0) {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (index, step) in steps {
        if best.map_or(true, |(_, b)| step.total_cmp(&b).is_gt()) {
            best = Some((index, step));
        }
    }
    best.map(|(index, _)| index)
}

/// Keep the items whose score vector falls into the trending cluster.
///
/// `scores` extracts the score vector of an item; input order is preserved.
/// Empty input yields empty output.
///
/// # Errors
/// [`Error::Configuration`](crate::error::Error::Configuration) when there are
/// fewer items than clusters or score vectors differ in length.
pub fn select_trending<T, F>(items: Vec<T>, model: &KMeans, scores: F) -> Result<Vec<T>>
where
    F: Fn(&T) -> &[f64],
{
    if items.is_empty() {
        return Ok(items);
    }

    let points: Vec<Vec<f64>> = items.iter().map(|item| scores(item).to_vec()).collect();
    debug!(candidates = points.len(), k = model.k(), "classifying score vectors");

    let fitted = model.fit(&points)?;
    let Some(selected) = trending_cluster(&fitted.centroids) else {
        debug!("every cluster is flat");
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .zip(fitted.assignments)
        .filter_map(|(item, cluster)| (cluster == selected).then_some(item))
        .collect())
}
