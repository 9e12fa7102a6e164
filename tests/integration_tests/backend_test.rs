//! OpenSearch backend integration tests
//!
//! Runs the OpenSearch corpus reader and the index synchronizer against a
//! mock server:
//! 1. Scrolled identifier listing, clearing the scroll on failure
//! 2. Term vectors with term statistics
//! 3. Date histograms, with and without a term filter
//! 4. Index setup and reindex, including unacknowledged steps

use serde_json::json;
use trendwatch::analysis::Granularity;
use trendwatch::config::{Config, FieldsConfig, OpenSearchConfig};
use trendwatch::corpus::{CorpusReader, DateRange, OpenSearchCorpus};
use trendwatch::error::Error;
use trendwatch::sync::IndexSynchronizer;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{foreground_start, reference_date};

const INDEX: &str = "records-trends";

fn opensearch_config(server: &MockServer) -> OpenSearchConfig {
    OpenSearchConfig {
        url: server.uri(),
        index_name: INDEX.into(),
        ..Default::default()
    }
}

fn corpus(server: &MockServer) -> OpenSearchCorpus {
    OpenSearchCorpus::new(&opensearch_config(server), &FieldsConfig::default()).unwrap()
}

fn synchronizer(server: &MockServer) -> IndexSynchronizer {
    let config = Config {
        opensearch: opensearch_config(server),
        ..Default::default()
    };
    IndexSynchronizer::new(&config).unwrap()
}

fn hits(ids: &[&str]) -> serde_json::Value {
    let hits: Vec<_> = ids.iter().map(|id| json!({ "_id": id })).collect();
    json!({ "_scroll_id": "scroll-1", "hits": { "hits": hits } })
}

fn acknowledged() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true }))
}

// ============================================================================
// Corpus Reads
// ============================================================================

#[tokio::test]
async fn test_list_ids_follows_scroll() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_search")))
        .and(query_param("scroll", "1m"))
        .and(body_partial_json(json!({ "_source": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["1", "2"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["3"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&[])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "succeeded": true })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = corpus(&server)
        .list_ids(DateRange::new(foreground_start(), reference_date()))
        .await
        .unwrap();

    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_failed_scroll_page_still_clears_scroll() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_search")))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(&["1", "2"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(500).set_body_string("search context lost"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_search/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "succeeded": true })))
        .expect(1)
        .mount(&server)
        .await;

    let result = corpus(&server)
        .list_ids(DateRange::new(foreground_start(), reference_date()))
        .await;

    match result {
        Err(Error::BackendResponse { status, .. }) => assert_eq!(status, 500),
        other => panic!("Expected BackendResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_term_vectors_with_statistics() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_mtermvectors")))
        .and(query_param("term_statistics", "true"))
        .and(body_partial_json(json!({ "ids": ["1", "2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [
                { "_id": "1", "found": true, "term_vectors": { "abstracts.value": { "terms": {
                    "higgs": { "term_freq": 2, "doc_freq": 40, "ttf": 95 },
                    "boson": { "term_freq": 1, "doc_freq": 12, "ttf": 20 }
                }}}},
                { "_id": "2", "found": true, "term_vectors": { "abstracts.value": { "terms": {
                    "higgs": { "term_freq": 3, "doc_freq": 40, "ttf": 95 }
                }}}}
            ]
        })))
        .mount(&server)
        .await;

    let vectors = corpus(&server)
        .term_vectors(&["1".to_string(), "2".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    let higgs = &vectors["1"]["higgs"];
    assert_eq!(higgs.term_freq, 2);
    assert_eq!(higgs.doc_freq_estimate, 40);
    assert_eq!(higgs.term_total_estimate, 95);
    assert_eq!(higgs.doc_total_estimate, 40);
    assert_eq!(vectors["2"]["higgs"].term_freq, 3);
}

#[tokio::test]
async fn test_term_vectors_skip_empty_request() {
    let server = MockServer::start().await;

    let vectors = corpus(&server).term_vectors(&[]).await.unwrap();

    assert!(vectors.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_term_histogram() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_search")))
        .and(body_partial_json(json!({
            "size": 0,
            "query": { "bool": { "must": [{ "match_phrase": { "abstracts.value": "higgs" } }] } },
            "aggs": { "hist": { "date_histogram": {
                "field": "earliest_date",
                "calendar_interval": "day"
            } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aggregations": { "hist": { "buckets": [
                { "key_as_string": "2024-01-08T00:00:00.000Z", "key": 1_704_672_000_000_i64, "doc_count": 1 },
                { "key_as_string": "2024-01-09T00:00:00.000Z", "key": 1_704_758_400_000_i64, "doc_count": 0 },
                { "key_as_string": "2024-01-10T00:00:00.000Z", "key": 1_704_844_800_000_i64, "doc_count": 7 }
            ] } }
        })))
        .mount(&server)
        .await;

    let histogram = corpus(&server)
        .date_histogram(
            DateRange::new(foreground_start(), reference_date()),
            Granularity::Day,
            Some("higgs"),
        )
        .await
        .unwrap();

    assert_eq!(histogram.len(), 3);
    assert_eq!(histogram.timestamps()[0], foreground_start());
    assert_eq!(histogram.counts(), &[1, 0, 7]);
}

#[tokio::test]
async fn test_second_granularity_uses_fixed_interval() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_search")))
        .and(body_partial_json(json!({
            "aggs": { "hist": { "date_histogram": { "fixed_interval": "1s" } } }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "aggregations": { "hist": { "buckets": [] } } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let histogram = corpus(&server)
        .date_histogram(
            DateRange::new(foreground_start(), reference_date()),
            Granularity::Second,
            None,
        )
        .await
        .unwrap();

    assert!(histogram.is_empty());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_search")))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard failure"))
        .mount(&server)
        .await;

    let result = corpus(&server)
        .date_histogram(
            DateRange::new(foreground_start(), reference_date()),
            Granularity::Day,
            None,
        )
        .await;

    match result {
        Err(Error::BackendResponse { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "shard failure");
        }
        other => panic!("Expected BackendResponse, got {other:?}"),
    }
}

// ============================================================================
// Index Maintenance
// ============================================================================

async fn mount_index_lifecycle(server: &MockServer, settings: ResponseTemplate) {
    Mock::given(method("HEAD"))
        .and(path(format!("/{INDEX}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{INDEX}")))
        .respond_with(acknowledged())
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{INDEX}/_settings")))
        .and(body_partial_json(json!({
            "analysis": { "analyzer": { "trends_analyzer": { "type": "custom" } } }
        })))
        .respond_with(settings)
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{INDEX}/_mapping")))
        .respond_with(acknowledged())
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_synchronization() {
    let server = MockServer::start().await;
    mount_index_lifecycle(&server, acknowledged()).await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_close")))
        .respond_with(acknowledged())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_open")))
        .respond_with(acknowledged())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_reindex"))
        .and(body_partial_json(json!({
            "source": { "index": "records-hep" },
            "dest": { "index": INDEX }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 120, "timed_out": false, "total": 3, "created": 2, "updated": 1
        })))
        .mount(&server)
        .await;

    let summary = synchronizer(&server).run().await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 1);
}

#[tokio::test]
async fn test_existing_index_is_not_recreated() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/{INDEX}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/{INDEX}")))
        .respond_with(acknowledged())
        .expect(0)
        .mount(&server)
        .await;

    let created = synchronizer(&server).setup_index().await.unwrap();

    assert!(!created);
}

#[tokio::test]
async fn test_unacknowledged_analyzer_reopens_index() {
    let server = MockServer::start().await;
    let refused = ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": false }));
    mount_index_lifecycle(&server, refused).await;

    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_close")))
        .respond_with(acknowledged())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{INDEX}/_open")))
        .respond_with(acknowledged())
        .expect(1)
        .mount(&server)
        .await;

    let result = synchronizer(&server).setup_analyzer().await;

    assert!(matches!(result, Err(Error::IndexMaintenance(_))));
}

#[tokio::test]
async fn test_timed_out_reindex_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_reindex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 60000, "timed_out": true, "total": 10, "created": 4, "updated": 0
        })))
        .mount(&server)
        .await;

    let result = synchronizer(&server).synchronize().await;

    assert!(matches!(result, Err(Error::IndexMaintenance(_))));
}
