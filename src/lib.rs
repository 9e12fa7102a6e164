//! trendwatch - Trending vocabulary detection over a document corpus
//!
//! Finds the terms whose usage rises most steeply in a recent time window
//! relative to a longer background window, and publishes them as the latest
//! trend result.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`analysis`] - Term aggregation, normalization, scoring, clustering and the pipeline
//! - [`corpus`] - Read-only corpus access (OpenSearch and in-memory)
//! - [`sync`] - Analysis index setup and reindexing from the source index
//! - [`cache`] - Latest trend result storage (Redis)
//! - [`related`] - Optional related-term lookup
//! - [`scheduler`] - Daily trigger for periodic runs
//! - [`metrics`] - Prometheus metrics of pipeline runs
//! - [`config`] - Configuration management and settings
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use trendwatch::analysis::TrendsDetector;
//! use trendwatch::config::Config;
//! use trendwatch::corpus::OpenSearchCorpus;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let corpus = OpenSearchCorpus::new(&config.opensearch, &config.fields)?;
//!     let detector = TrendsDetector::new(corpus);
//!     let params = config.trends.pipeline_params();
//!     let reference = params.granularity.truncate(chrono::Utc::now());
//!     for trend in detector.run_pipeline(reference, &params).await? {
//!         println!("{}", trend.term);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod related;
pub mod scheduler;
pub mod sync;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::{publish_trends, PipelineParams, TrendCandidate, TrendsDetector};
    pub use crate::cache::{TrendResult, TrendStore};
    pub use crate::config::Config;
    pub use crate::corpus::{CorpusReader, DateRange};
    pub use crate::error::{Error, ErrorCategory, Result};
}

// Direct re-exports for convenience
pub use analysis::{Granularity, PipelineParams, TrendsDetector};
