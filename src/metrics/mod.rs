//! Prometheus metrics for trend pipeline runs
//!
//! This module provides metrics tracking for:
//! - Pipeline runs: outcome counter, run duration, per-stage term counts
//! - Publishing: records written to the result cache
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram, Counter,
    CounterVec, Encoder, GaugeVec, Histogram, TextEncoder,
};
use std::sync::{Mutex, OnceLock};

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all pipeline metrics
struct PipelineMetrics {
    runs: CounterVec,
    run_duration: Histogram,
    stage_terms: GaugeVec,
    published: Counter,
}

/// Global storage for pipeline metrics
static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

/// Serializes concurrent `init_metrics` calls
static INIT_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = trendwatch::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let pipeline = PipelineMetrics {
        runs: register_counter_vec!(
            "trendwatch_pipeline_runs_total",
            "Total trend pipeline runs by outcome",
            &["outcome"]
        )?,
        run_duration: register_histogram!(
            "trendwatch_pipeline_run_duration_seconds",
            "Trend pipeline run duration in seconds",
            vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
        )?,
        stage_terms: register_gauge_vec!(
            "trendwatch_pipeline_stage_terms",
            "Number of terms leaving each pipeline stage in the last run",
            &["stage"]
        )?,
        published: register_counter!(
            "trendwatch_published_results_total",
            "Total trend results written to the cache"
        )?,
    };

    PIPELINE_METRICS
        .set(pipeline)
        .map_err(|_| "Pipeline metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    PIPELINE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Outcome label of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// At least one trend was found
    Trends,
    /// The run succeeded without finding trends
    Empty,
    /// The run failed
    Failed,
}

impl RunOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Trends => "trends",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }
}

/// Record the outcome of a pipeline run
pub fn record_run(outcome: RunOutcome) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.runs.with_label_values(&[outcome.as_str()]).inc();
    }
}

/// Record how many terms left a pipeline stage
pub fn record_stage_terms(stage: &str, count: usize) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.stage_terms.with_label_values(&[stage]).set(count as f64);
    }
}

/// Record a trend result written to the cache
pub fn record_published() {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.published.inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a pipeline run timer
pub fn start_run_timer() -> MetricsTimer {
    match PIPELINE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.run_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
