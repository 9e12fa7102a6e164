//! Pipeline integration tests
//!
//! Runs the full pipeline over in-memory corpora:
//! 1. Flat vocabulary yields no trends
//! 2. A rising term is selected, with and without smoothing
//! 3. Frequency threshold and pruning
//! 4. Term-vector batching
//! 5. Publishing the latest result

use trendwatch::analysis::{publish_trends, TrendsDetector};
use trendwatch::cache::{MemoryTrendStore, TrendStore};
use trendwatch::corpus::MemoryCorpus;

use super::fixtures::{daily_params, foreground_start, reference_date, CorpusBuilder, RISING};

fn terms(trends: &[trendwatch::analysis::TrendCandidate]) -> Vec<&str> {
    trends.iter().map(|t| t.term.as_str()).collect()
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_flat_vocabulary_has_no_trends() {
    let detector = TrendsDetector::new(CorpusBuilder::new().build());

    let trends = detector
        .run_pipeline(reference_date(), &daily_params(1))
        .await
        .unwrap();

    assert!(trends.is_empty(), "a constant term must not trend");
}

#[tokio::test]
async fn test_rising_term_is_selected() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());

    let trends = detector
        .run_pipeline(reference_date(), &daily_params(2))
        .await
        .unwrap();

    assert_eq!(terms(&trends), vec!["x"]);

    let x = &trends[0];
    assert_eq!(x.stats.doc_freq, 15);
    assert_eq!(x.stats.doc_total, 22);
    assert_eq!(x.score.len(), 3);
    assert_eq!(x.score.timestamps[0], foreground_start());
    assert!(x.score.scores.windows(2).all(|w| w[1] > w[0]));
}

#[tokio::test]
async fn test_rising_term_is_selected_with_smoothing() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let params = trendwatch::PipelineParams {
        smoothing_len: 3,
        ..daily_params(2)
    };

    let trends = detector.run_pipeline(reference_date(), &params).await.unwrap();

    assert_eq!(terms(&trends), vec!["x"]);
    assert_eq!(trends[0].score.timestamps.len(), 3);
    assert_eq!(trends[0].score.timestamps[0], foreground_start());
}

#[tokio::test]
async fn test_rare_terms_are_thresholded_out() {
    let mut rare = [0; 10];
    rare[9] = 2;
    let detector = TrendsDetector::new(
        CorpusBuilder::new()
            .term("x", RISING)
            .term("rare", rare)
            .build(),
    );

    let trends = detector
        .run_pipeline(reference_date(), &daily_params(2))
        .await
        .unwrap();

    assert_eq!(terms(&trends), vec!["x"]);
}

#[tokio::test]
async fn test_trends_are_pruned_by_recency() {
    let detector = TrendsDetector::new(
        CorpusBuilder::new()
            .term("a", RISING)
            .term("b", RISING)
            .term("c", RISING)
            .archived("b", 5)
            .archived("c", 10)
            .build(),
    );
    let params = trendwatch::PipelineParams {
        num_trends: 2,
        ..daily_params(2)
    };

    let trends = detector.run_pipeline(reference_date(), &params).await.unwrap();

    // a: 15/22, b: 15/27, c: 15/32
    assert_eq!(terms(&trends), vec!["a", "b"]);
}

#[tokio::test]
async fn test_empty_corpus_has_no_trends() {
    let detector = TrendsDetector::new(MemoryCorpus::default());

    let trends = detector
        .run_pipeline(reference_date(), &daily_params(2))
        .await
        .unwrap();

    assert!(trends.is_empty());
    assert_eq!(detector.reader().term_vector_requests(), 0);
}

#[tokio::test]
async fn test_everything_below_threshold_has_no_trends() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let params = trendwatch::PipelineParams {
        minimum_frequency_threshold: 1000,
        ..daily_params(2)
    };

    let trends = detector.run_pipeline(reference_date(), &params).await.unwrap();

    assert!(trends.is_empty());
}

#[tokio::test]
async fn test_term_vectors_are_batched() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let params = trendwatch::PipelineParams {
        term_vector_batch: 7,
        ..daily_params(2)
    };

    detector.run_pipeline(reference_date(), &params).await.unwrap();

    // 30 foreground documents in batches of 7
    assert_eq!(detector.reader().term_vector_requests(), 5);
}

#[tokio::test]
async fn test_seeded_clustering_selects_rising_term() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let params = trendwatch::PipelineParams {
        cluster_seed: Some(42),
        ..daily_params(2)
    };

    let trends = detector.run_pipeline(reference_date(), &params).await.unwrap();

    assert_eq!(terms(&trends), vec!["x"]);
}

// ============================================================================
// Publishing
// ============================================================================

#[tokio::test]
async fn test_publish_stores_latest_result() {
    let detector = TrendsDetector::new(CorpusBuilder::new().term("x", RISING).build());
    let store = MemoryTrendStore::new();

    let result = publish_trends(&detector, &store, &daily_params(2), reference_date())
        .await
        .unwrap();

    assert_eq!(result.terms, vec!["x"]);
    assert_eq!(result.start, foreground_start());
    assert_eq!(result.end, reference_date());
    assert_eq!(store.latest().await.unwrap(), Some(result));

    let raw = store.raw().await.unwrap();
    assert!(raw.contains(r#""terms":"x""#), "unexpected record {raw}");
}

#[tokio::test]
async fn test_publish_empty_result() {
    let detector = TrendsDetector::new(CorpusBuilder::new().build());
    let store = MemoryTrendStore::new();

    let result = publish_trends(&detector, &store, &daily_params(1), reference_date())
        .await
        .unwrap();

    assert!(result.terms.is_empty());
    let latest = store.latest().await.unwrap().unwrap();
    assert!(latest.terms.is_empty());
}
