//! Trend pipeline orchestration
//!
//! One run, given a reference date:
//!
//! ```text
//! ids in (foreground_start, reference]
//!   -> term vectors -> TermTable -> threshold + sort
//!   -> per-term histograms over (background_start, reference], normalized
//!   -> smoothed z-scores of the foreground buckets
//!   -> k-means, keep the steepest-rising cluster
//!   -> sort by doc_freq / doc_total, keep the top N
//! ```
//!
//! Any stage that ends up with nothing to work on stops the run with an empty
//! result. Errors are returned to the caller as they are; the pipeline never
//! retries.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use super::classify::select_trending;
use super::granularity::Granularity;
use super::histogram::{normalize, NormalizedHistogram};
use super::kmeans::KMeans;
use super::score::{edge_split, transform_score, ScoreSeries};
use super::terms::{aggregate_terms, threshold_sort, TermStats, DEFAULT_TERM_VECTOR_BATCH};
use crate::cache::{TrendResult, TrendStore};
use crate::corpus::{CorpusReader, DateRange};
use crate::error::{Error, Result};
use crate::metrics::{self, RunOutcome};

/// Restarts of seeded k-means
pub const SEEDED_N_INIT: usize = 10;

/// Parameters of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub granularity: Granularity,
    /// Foreground length, in buckets
    pub foreground_window: u32,
    /// Background length, in buckets
    pub background_window: u32,
    /// Minimum sampled-document frequency of a candidate term
    pub minimum_frequency_threshold: u64,
    /// Moving-sum window, in buckets
    pub smoothing_len: usize,
    pub num_cluster: usize,
    /// Trends kept after pruning
    pub num_trends: usize,
    pub term_vector_batch: usize,
    /// Per-term histogram requests in flight
    pub histogram_concurrency: usize,
    /// k-means++ seed; deterministic farthest-point seeding when absent
    pub cluster_seed: Option<u64>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            granularity: Granularity::Day,
            foreground_window: 7,
            background_window: 120,
            minimum_frequency_threshold: 5,
            smoothing_len: 7,
            num_cluster: 4,
            num_trends: 10,
            term_vector_batch: DEFAULT_TERM_VECTOR_BATCH,
            histogram_concurrency: 8,
            cluster_seed: None,
        }
    }
}

impl PipelineParams {
    /// Reject window, smoothing and clustering combinations that cannot
    /// produce a foreground score series.
    ///
    /// With `h = background_window - foreground_window` background-only
    /// buckets, the foreground start sits at index `h` of the histogram. The
    /// first foreground score sums the `smoothing_len` ratios ending there, so
    /// `smoothing_len` may be at most `h + 1`. The trailing edge trimmed by the
    /// smoothing must also leave the foreground start inside the series, which
    /// needs `foreground_window` above the trailing half of `smoothing_len - 1`.
    pub fn validate(&self) -> Result<()> {
        if self.foreground_window == 0 || self.background_window == 0 {
            return Err(Error::config("window lengths must be greater than 0"));
        }
        if self.background_window <= self.foreground_window {
            return Err(Error::config(
                "background_window must be larger than foreground_window",
            ));
        }
        self.windows(Utc::now())?;
        if self.smoothing_len == 0 {
            return Err(Error::config("smoothing_len must be greater than 0"));
        }
        let history = (self.background_window - self.foreground_window) as usize;
        if self.smoothing_len > history + 1 {
            return Err(Error::config(format!(
                "smoothing_len {} exceeds the {history} background-only buckets plus the foreground start",
                self.smoothing_len
            )));
        }
        let (_, trailing) = edge_split(self.smoothing_len - 1);
        if self.foreground_window as usize <= trailing {
            return Err(Error::config(format!(
                "foreground_window must be larger than {trailing} for smoothing_len {}",
                self.smoothing_len
            )));
        }
        if self.minimum_frequency_threshold == 0 {
            return Err(Error::config(
                "minimum_frequency_threshold must be greater than 0",
            ));
        }
        if self.num_cluster == 0 {
            return Err(Error::config("num_cluster must be greater than 0"));
        }
        if self.num_trends == 0 {
            return Err(Error::config("num_trends must be greater than 0"));
        }
        if self.term_vector_batch == 0 {
            return Err(Error::config("term_vector_batch must be greater than 0"));
        }
        if self.histogram_concurrency == 0 {
            return Err(Error::config("histogram_concurrency must be greater than 0"));
        }
        Ok(())
    }

    /// `(foreground_start, background_start)` for a run ending at `reference_date`
    ///
    /// # Errors
    /// [`Error::Configuration`] when a window reaches outside the representable
    /// date range.
    pub fn windows(
        &self,
        reference_date: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        Ok((
            self.window_start(reference_date, self.foreground_window)?,
            self.window_start(reference_date, self.background_window)?,
        ))
    }

    fn window_start(&self, reference_date: DateTime<Utc>, buckets: u32) -> Result<DateTime<Utc>> {
        i32::try_from(buckets)
            .ok()
            .and_then(|n| self.granularity.duration().checked_mul(n))
            .and_then(|span| reference_date.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::config(format!(
                    "a window of {buckets} {} buckets before {reference_date} is out of range",
                    self.granularity
                ))
            })
    }

    fn kmeans(&self) -> KMeans {
        match self.cluster_seed {
            Some(seed) => KMeans::new(self.num_cluster)
                .with_seed(seed)
                .with_n_init(SEEDED_N_INIT),
            None => KMeans::new(self.num_cluster),
        }
    }
}

/// A term carried through the later pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendCandidate {
    pub term: String,
    pub stats: TermStats,
    pub score: ScoreSeries,
}

/// Term with its histogram normalized against the corpus volume
#[derive(Debug, Clone)]
pub struct NormalizedTerm {
    pub term: String,
    pub stats: TermStats,
    pub histogram: NormalizedHistogram,
}

/// Runs the trend pipeline against an injected corpus reader
pub struct TrendsDetector<C> {
    reader: C,
}

impl<C: CorpusReader> TrendsDetector<C> {
    pub fn new(reader: C) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &C {
        &self.reader
    }

    /// Run the whole pipeline and return the ranked trends, best first.
    ///
    /// # Errors
    /// Configuration, contract, alignment and lookup errors from the stages,
    /// and backend errors unchanged.
    pub async fn run_pipeline(
        &self,
        reference_date: DateTime<Utc>,
        params: &PipelineParams,
    ) -> Result<Vec<TrendCandidate>> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "trend_run",
            %run_id,
            reference = %reference_date,
            granularity = %params.granularity
        );

        async move {
            let _timer = metrics::start_run_timer();
            let outcome = self.stages(reference_date, params).await;
            match &outcome {
                Ok(trends) if trends.is_empty() => metrics::record_run(RunOutcome::Empty),
                Ok(_) => metrics::record_run(RunOutcome::Trends),
                Err(_) => metrics::record_run(RunOutcome::Failed),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn stages(
        &self,
        reference_date: DateTime<Utc>,
        params: &PipelineParams,
    ) -> Result<Vec<TrendCandidate>> {
        params.validate()?;
        let (foreground_start, background_start) = params.windows(reference_date)?;
        info!(
            foreground_start = %foreground_start,
            background_start = %background_start,
            "running trends pipeline"
        );

        let ids = self
            .reader
            .list_ids(DateRange::new(foreground_start, reference_date))
            .await?;
        metrics::record_stage_terms("documents", ids.len());
        if ids.is_empty() {
            info!("no documents in the foreground window");
            return Ok(Vec::new());
        }

        let table = aggregate_terms(&self.reader, &ids, params.term_vector_batch).await?;
        let terms = threshold_sort(table, params.minimum_frequency_threshold);
        metrics::record_stage_terms("thresholded", terms.len());
        debug!(terms = terms.len(), "terms above frequency threshold");

        let background = DateRange::new(background_start, reference_date);
        let histograms = self
            .normalized_histograms(terms, background, params)
            .await?;
        metrics::record_stage_terms("histograms", histograms.len());

        let candidates = hist_scores(histograms, foreground_start, params.smoothing_len)?;
        if candidates.is_empty() {
            info!("no candidate terms");
            return Ok(Vec::new());
        }

        let trending = select_trending(candidates, &params.kmeans(), |c| {
            c.score.scores.as_slice()
        })?;
        metrics::record_stage_terms("trending", trending.len());

        let trends = prune(trending, params.num_trends);
        info!(
            trends = trends.len(),
            top = trends.first().map(|t| t.term.as_str()).unwrap_or("-"),
            "trends pipeline finished"
        );
        Ok(trends)
    }

    /// Fetch each term's histogram over `range` and normalize it against the
    /// corpus-wide histogram of the same range.
    ///
    /// Requests run `histogram_concurrency` at a time; the output keeps the
    /// order of `terms`. Terms without any document in the range are dropped.
    pub async fn normalized_histograms(
        &self,
        terms: Vec<(String, TermStats)>,
        range: DateRange,
        params: &PipelineParams,
    ) -> Result<Vec<NormalizedTerm>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let reference = self
            .reader
            .date_histogram(range, params.granularity, None)
            .await?;
        if reference.is_empty() {
            debug!("reference histogram is empty");
            return Ok(Vec::new());
        }
        debug!(
            terms = terms.len(),
            buckets = reference.len(),
            "retrieving term histograms"
        );

        let granularity = params.granularity;
        let fetched: Vec<_> = stream::iter(terms)
            .map(|(term, stats)| async move {
                let histogram = self
                    .reader
                    .date_histogram(range, granularity, Some(&term))
                    .await?;
                Ok::<_, Error>((term, stats, histogram))
            })
            .buffered(params.histogram_concurrency.max(1))
            .try_collect()
            .await?;

        let mut normalized = Vec::with_capacity(fetched.len());
        for (term, stats, histogram) in fetched {
            if histogram.is_empty() {
                debug!(%term, "no documents in background window, dropping");
                continue;
            }
            normalized.push(NormalizedTerm {
                histogram: normalize(&histogram, &reference)?,
                term,
                stats,
            });
        }
        Ok(normalized)
    }
}

/// Score every normalized histogram over the foreground window
pub fn hist_scores(
    histograms: Vec<NormalizedTerm>,
    foreground_start: DateTime<Utc>,
    smoothing_len: usize,
) -> Result<Vec<TrendCandidate>> {
    debug!(
        terms = histograms.len(),
        smoothing_len, "computing foreground scores"
    );
    histograms
        .into_iter()
        .map(|entry| {
            let score = transform_score(&entry.histogram, foreground_start, smoothing_len)?;
            Ok(TrendCandidate {
                term: entry.term,
                stats: entry.stats,
                score,
            })
        })
        .collect()
}

/// Keep the `num_trends` candidates with the highest `doc_freq / doc_total`.
///
/// The sort is stable, so equal ratios keep their clustering order.
#[must_use]
pub fn prune(mut trending: Vec<TrendCandidate>, num_trends: usize) -> Vec<TrendCandidate> {
    trending.sort_by(|a, b| b.stats.recency().total_cmp(&a.stats.recency()));
    trending.truncate(num_trends);
    trending
}

/// Run the pipeline and publish its outcome as the latest trend result.
///
/// A failed run is logged and leaves the stored record untouched.
pub async fn publish_trends<C, S>(
    detector: &TrendsDetector<C>,
    store: &S,
    params: &PipelineParams,
    reference_date: DateTime<Utc>,
) -> Result<TrendResult>
where
    C: CorpusReader,
    S: TrendStore + ?Sized,
{
    let trends = match detector.run_pipeline(reference_date, params).await {
        Ok(trends) => trends,
        Err(e) => {
            error!(error = %e, "trend run failed, keeping the previous result");
            return Err(e);
        }
    };

    let (foreground_start, _) = params.windows(reference_date)?;
    let result = TrendResult {
        terms: trends.into_iter().map(|t| t.term).collect(),
        start: foreground_start,
        end: reference_date,
        granularity: params.granularity,
    };

    store.publish(&result).await?;
    metrics::record_published();
    info!(terms = result.terms.len(), "published trend result");
    Ok(result)
}
