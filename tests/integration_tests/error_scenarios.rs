//! Error scenario integration tests
//!
//! Tests failure modes of a pipeline run:
//! 1. Backend errors are surfaced unchanged
//! 2. Term-vector answers that break the reader contract
//! 3. Invalid parameters, including windows outside the date range
//! 4. Reference dates and histograms that do not line up
//! 5. A failed run leaves the published result untouched

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};
use trendwatch::analysis::{publish_trends, Granularity, Histogram, TrendsDetector};
use trendwatch::cache::{MemoryTrendStore, TrendStore};
use trendwatch::corpus::{CorpusReader, DateRange, MemoryCorpus, TermVectors};
use trendwatch::error::{Error, Result};
use trendwatch::PipelineParams;

use super::fixtures::{daily_params, reference_date, CorpusBuilder, RISING};

/// Reader whose every call fails like an unavailable cluster
struct UnavailableReader;

#[async_trait]
impl CorpusReader for UnavailableReader {
    async fn list_ids(&self, _range: DateRange) -> Result<Vec<String>> {
        Err(Error::BackendResponse {
            status: 503,
            body: "cluster unavailable".into(),
        })
    }

    async fn term_vectors(&self, _ids: &[String]) -> Result<TermVectors> {
        Ok(TermVectors::new())
    }

    async fn date_histogram(
        &self,
        _range: DateRange,
        _granularity: Granularity,
        _term: Option<&str>,
    ) -> Result<Histogram> {
        Ok(Histogram::empty())
    }
}

/// Delegates to a memory corpus but loses one document per term-vector batch
struct LossyReader(MemoryCorpus);

#[async_trait]
impl CorpusReader for LossyReader {
    async fn list_ids(&self, range: DateRange) -> Result<Vec<String>> {
        self.0.list_ids(range).await
    }

    async fn term_vectors(&self, ids: &[String]) -> Result<TermVectors> {
        let mut vectors = self.0.term_vectors(ids).await?;
        if let Some(first) = ids.first() {
            vectors.remove(first);
        }
        Ok(vectors)
    }

    async fn date_histogram(
        &self,
        range: DateRange,
        granularity: Granularity,
        term: Option<&str>,
    ) -> Result<Histogram> {
        self.0.date_histogram(range, granularity, term).await
    }
}

/// Delegates to a memory corpus but drops the oldest bucket of the
/// corpus-wide histogram
struct MisalignedReader(MemoryCorpus);

#[async_trait]
impl CorpusReader for MisalignedReader {
    async fn list_ids(&self, range: DateRange) -> Result<Vec<String>> {
        self.0.list_ids(range).await
    }

    async fn term_vectors(&self, ids: &[String]) -> Result<TermVectors> {
        self.0.term_vectors(ids).await
    }

    async fn date_histogram(
        &self,
        range: DateRange,
        granularity: Granularity,
        term: Option<&str>,
    ) -> Result<Histogram> {
        let histogram = self.0.date_histogram(range, granularity, term).await?;
        if term.is_some() {
            return Ok(histogram);
        }
        Histogram::from_pairs(
            histogram
                .timestamps()
                .iter()
                .copied()
                .zip(histogram.counts().iter().copied())
                .skip(1),
        )
    }
}

// ============================================================================
// Backend Errors
// ============================================================================

#[tokio::test]
async fn test_backend_error_is_surfaced_unchanged() {
    let detector = TrendsDetector::new(UnavailableReader);

    let result = detector.run_pipeline(reference_date(), &daily_params(2)).await;

    match result {
        Err(Error::BackendResponse { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "cluster unavailable");
        }
        other => panic!("Expected BackendResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_term_vectors_violate_contract() {
    let detector = TrendsDetector::new(LossyReader(CorpusBuilder::new().term("x", RISING).build()));

    let result = detector.run_pipeline(reference_date(), &daily_params(2)).await;

    assert!(
        matches!(result, Err(Error::BackendContractViolation(_))),
        "Expected contract violation, got {result:?}"
    );
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[tokio::test]
async fn test_more_clusters_than_candidates() {
    // "y" and "x" are the only candidates
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());

    let result = detector.run_pipeline(reference_date(), &daily_params(3)).await;

    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[tokio::test]
async fn test_invalid_parameters_rejected_before_reading() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let params = PipelineParams {
        foreground_window: 10,
        background_window: 10,
        ..daily_params(2)
    };

    let result = detector.run_pipeline(reference_date(), &params).await;

    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(detector.reader().term_vector_requests(), 0);
}

#[tokio::test]
async fn test_window_beyond_date_range_is_rejected() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let params = PipelineParams {
        background_window: 200_000_000,
        ..daily_params(2)
    };

    let result = detector.run_pipeline(reference_date(), &params).await;

    assert!(
        matches!(result, Err(Error::Configuration(_))),
        "Expected configuration error, got {result:?}"
    );
    assert_eq!(detector.reader().term_vector_requests(), 0);
}

#[tokio::test]
async fn test_error_categories() {
    let detector = TrendsDetector::new(UnavailableReader);
    let err = detector
        .run_pipeline(reference_date(), &daily_params(2))
        .await
        .unwrap_err();
    assert_eq!(err.category().as_str(), "backend");

    let detector = TrendsDetector::new(MemoryCorpus::default());
    let err = detector
        .run_pipeline(reference_date(), &daily_params(0))
        .await
        .unwrap_err();
    assert_eq!(err.category().as_str(), "config");
    assert!(!err.is_recoverable());
}

// ============================================================================
// Lookup and Alignment Errors
// ============================================================================

#[tokio::test]
async fn test_reference_off_bucket_boundary_is_lookup_error() {
    let store = MemoryTrendStore::new();
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let published = assert_ok!(
        publish_trends(&detector, &store, &daily_params(2), reference_date()).await
    );

    let midday = Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap();
    let result = publish_trends(&detector, &store, &daily_params(2), midday).await;

    assert!(
        matches!(result, Err(Error::Lookup(_))),
        "Expected lookup error, got {result:?}"
    );
    assert_eq!(store.latest().await.unwrap(), Some(published));
}

#[tokio::test]
async fn test_term_bucket_missing_from_reference_is_alignment_error() {
    let store = MemoryTrendStore::new();
    let good = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let published = assert_ok!(
        publish_trends(&good, &store, &daily_params(2), reference_date()).await
    );

    let misaligned = TrendsDetector::new(MisalignedReader(
        CorpusBuilder::new().term("x", RISING).build(),
    ));
    let result = publish_trends(&misaligned, &store, &daily_params(2), reference_date()).await;

    assert!(
        matches!(result, Err(Error::Alignment(_))),
        "Expected alignment error, got {result:?}"
    );
    assert_eq!(store.latest().await.unwrap(), Some(published));
}

// ============================================================================
// Publishing
// ============================================================================

#[tokio::test]
async fn test_failed_run_keeps_previous_result() {
    let store = MemoryTrendStore::new();
    let good = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let published = assert_ok!(
        publish_trends(&good, &store, &daily_params(2), reference_date()).await
    );

    let failing = TrendsDetector::new(UnavailableReader);
    assert_err!(publish_trends(&failing, &store, &daily_params(2), reference_date()).await);
    assert_eq!(store.latest().await.unwrap(), Some(published));
}

#[tokio::test]
async fn test_failed_first_run_publishes_nothing() {
    let store = MemoryTrendStore::new();
    let failing = TrendsDetector::new(UnavailableReader);

    assert_err!(publish_trends(&failing, &store, &daily_params(2), reference_date()).await);
    assert!(store.raw().await.is_none());
}
