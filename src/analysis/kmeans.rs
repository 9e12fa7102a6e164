//! Lloyd's k-means over dense score vectors
//!
//! Two seeding strategies:
//! - unseeded: greedy farthest-point seeding started from the largest-norm
//!   point. Ties are broken on the vector values, never on input position, so
//!   permuting the input permutes the assignments and nothing else.
//! - seeded: k-means++ D²-sampling driven by a ChaCha8 stream, restarted
//!   `n_init` times with consecutive seeds, keeping the lowest inertia. The
//!   points are sampled in value order, so the same seed yields the same
//!   partition for any permutation of the input.

use std::cmp::Ordering;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};

/// Default upper bound on Lloyd iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Outcome of a k-means run
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster index of each input point, in input order
    pub assignments: Vec<usize>,
    /// Final centroids, indexed by cluster
    pub centroids: Vec<Vec<f64>>,
    /// Lloyd iterations performed
    pub iterations: usize,
    /// Sum of squared distances of points to their centroid
    pub inertia: f64,
}

/// K-means parameters
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    seed: Option<u64>,
    n_init: usize,
}

impl KMeans {
    /// Deterministic, order-independent k-means with `k` clusters
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
            n_init: 1,
        }
    }

    /// Use k-means++ sampling seeded with `seed`
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of seeded restarts (ignored without a seed)
    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Cluster `points`.
    ///
    /// # Errors
    /// [`Error::Configuration`] if `k` is 0, there are fewer points than
    /// clusters, or the points do not share one dimension.
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<KMeansResult> {
        if self.k == 0 {
            return Err(Error::config("cluster count must be at least 1"));
        }
        if points.len() < self.k {
            return Err(Error::config(format!(
                "cannot form {} clusters from {} candidates",
                self.k,
                points.len()
            )));
        }
        let dim = points[0].len();
        if points.iter().any(|p| p.len() != dim) {
            return Err(Error::config("score vectors have different lengths"));
        }

        match self.seed {
            None => Ok(lloyd(points, farthest_point_init(points, self.k), self.max_iterations)),
            Some(seed) => {
                // draws index into a value-sorted copy, never the caller's order
                let mut order: Vec<usize> = (0..points.len()).collect();
                order.sort_by(|&a, &b| compare_vectors(&points[a], &points[b]));
                let canonical: Vec<Vec<f64>> =
                    order.iter().map(|&index| points[index].clone()).collect();

                let mut best: Option<KMeansResult> = None;
                for run in 0..self.n_init {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(run as u64));
                    let centroids = kmeanspp_init(&canonical, self.k, &mut rng);
                    let result = lloyd(&canonical, centroids, self.max_iterations);
                    if best.as_ref().map_or(true, |b| result.inertia < b.inertia) {
                        best = Some(result);
                    }
                }
                let mut best = best.ok_or_else(|| Error::other("k-means produced no run"))?;

                let mut assignments = vec![0; points.len()];
                for (position, &index) in order.iter().enumerate() {
                    assignments[index] = best.assignments[position];
                }
                best.assignments = assignments;
                Ok(best)
            }
        }
    }
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iterations: usize) -> KMeansResult {
    let k = centroids.len();
    let dim = points[0].len();
    let mut assignments = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;

        let mut changed = false;
        for (point, assignment) in points.iter().zip(assignments.iter_mut()) {
            let nearest = nearest_centroid(point, &centroids);
            if *assignment != nearest {
                *assignment = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(&assignments) {
            counts[cluster] += 1;
            for (sum, value) in sums[cluster].iter_mut().zip(point) {
                *sum += value;
            }
        }
        for (cluster, sum) in sums.into_iter().enumerate() {
            // an emptied cluster keeps its previous centroid
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                centroids[cluster] = sum.into_iter().map(|s| s / n).collect();
            }
        }
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(point, &cluster)| squared_euclidean(point, &centroids[cluster]))
        .sum();

    KMeansResult {
        assignments,
        centroids,
        iterations,
        inertia,
    }
}

/// Total order on vectors used to break ties independently of input order
fn compare_vectors(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn farthest_point_init(points: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let norm = |p: &[f64]| p.iter().map(|v| v * v).sum::<f64>();
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);

    let first = points
        .iter()
        .max_by(|a, b| norm(a).total_cmp(&norm(b)).then_with(|| compare_vectors(a, b)));
    if let Some(first) = first {
        centroids.push(first.clone());
    }

    while centroids.len() < k {
        let distance = |p: &[f64]| {
            centroids
                .iter()
                .map(|c| squared_euclidean(p, c))
                .fold(f64::INFINITY, f64::min)
        };
        let next = points.iter().max_by(|a, b| {
            distance(a)
                .total_cmp(&distance(b))
                .then_with(|| compare_vectors(a, b))
        });
        match next {
            Some(next) => centroids.push(next.clone()),
            None => break,
        }
    }

    centroids
}

fn kmeanspp_init<R: Rng>(points: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_euclidean(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        // all remaining points coincide with a centroid
        let index = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..points.len()),
        };
        centroids.push(points[index].clone());
    }

    centroids
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

#[inline]
fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
