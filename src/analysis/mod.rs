//! Trend detection pipeline
//!
//! - [`granularity`] - time-bucket units
//! - [`terms`] - term aggregation and frequency thresholding
//! - [`histogram`] - date histograms and normalization
//! - [`score`] - moving-sum smoothing and foreground z-scores
//! - [`kmeans`] / [`classify`] - clustering and trending-cluster selection
//! - [`detector`] - the orchestrator and the publish step

pub mod classify;
pub mod detector;
pub mod granularity;
pub mod histogram;
pub mod kmeans;
pub mod score;
pub mod terms;

pub use detector::{publish_trends, PipelineParams, TrendCandidate, TrendsDetector};
pub use granularity::Granularity;
pub use histogram::{Histogram, NormalizedHistogram};
pub use score::ScoreSeries;
pub use terms::{TermStats, TermTable};
