//! Related-term lookup against a mock word2vec service

use std::time::Duration;

use serde_json::json;
use trendwatch::config::RelatedConfig;
use trendwatch::related::{related_or_empty, MagpieClient, RelatedTerms};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn related_config(server: &MockServer, limit: usize) -> RelatedConfig {
    RelatedConfig {
        enabled: true,
        url: format!("{}/api", server.uri()),
        limit,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_related_terms_exclude_query_term() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/word2vec"))
        .and(body_json(json!({ "corpus": "keywords", "positive": ["higgs"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vector": [["higgs", 1.0], ["boson", 0.91], ["lhc", 0.84], ["atlas", 0.8]]
        })))
        .mount(&server)
        .await;

    let client = MagpieClient::new(&related_config(&server, 2)).unwrap();
    let related = client.related("higgs").await.unwrap();

    assert_eq!(related, vec!["boson", "lhc"]);
}

#[tokio::test]
async fn test_service_error_yields_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/word2vec"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = MagpieClient::new(&related_config(&server, 5)).unwrap();

    assert!(client.related("higgs").await.is_err());
    assert!(related_or_empty(&client, "higgs").await.is_empty());
}

#[tokio::test]
async fn test_slow_service_yields_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/word2vec"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "vector": [["boson", 0.9]] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client =
        MagpieClient::with_timeout(&related_config(&server, 5), Duration::from_millis(100))
            .unwrap();

    assert!(related_or_empty(&client, "higgs").await.is_empty());
}
