//! OpenSearch-backed corpus reader
//!
//! - identifiers: `_search` with `exists` + `range` filters, paged through the
//!   scroll API
//! - term vectors: `_mtermvectors` with term statistics, one request per batch
//! - histograms: size-0 `_search` with a `date_histogram` aggregation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use opensearch::{
    auth::Credentials,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    ClearScrollParts, MtermvectorsParts, OpenSearch, ScrollParts, SearchParts,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{CorpusReader, DateRange, DocumentTerms, TermVectorEntry, TermVectors};
use crate::analysis::granularity::Granularity;
use crate::analysis::histogram::Histogram;
use crate::config::{FieldsConfig, OpenSearchConfig};
use crate::error::{Error, Result};
use crate::utils::from_epoch_millis;

/// Hits per scroll page
const SCROLL_PAGE_SIZE: usize = 1000;

/// How long the backend keeps a scroll context between pages
const SCROLL_KEEP_ALIVE: &str = "1m";

/// Build a client for `config`
pub fn connect(config: &OpenSearchConfig) -> Result<OpenSearch> {
    let url = Url::parse(&config.url)
        .map_err(|e| Error::config(format!("Invalid OpenSearch URL '{}': {e}", config.url)))?;

    let conn_pool = SingleNodeConnectionPool::new(url);
    let mut builder = TransportBuilder::new(conn_pool).disable_proxy();
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
    }
    let transport = builder
        .build()
        .map_err(|e| Error::with_source("Failed to build OpenSearch transport", e))?;

    Ok(OpenSearch::new(transport))
}

/// Decode a successful response body, or report the status and body
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::BackendResponse {
            status: status.as_u16(),
            body,
        });
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct MtermvectorsResponse {
    docs: Vec<TermVectorDoc>,
}

#[derive(Deserialize)]
struct TermVectorDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    term_vectors: HashMap<String, FieldTermVector>,
}

#[derive(Deserialize)]
struct FieldTermVector {
    #[serde(default)]
    terms: HashMap<String, TermInfo>,
}

#[derive(Deserialize)]
struct TermInfo {
    #[serde(default)]
    term_freq: u64,
    #[serde(default)]
    doc_freq: u64,
    #[serde(default)]
    ttf: u64,
}

#[derive(Deserialize)]
struct HistogramResponse {
    #[serde(default)]
    aggregations: Option<HistogramAggregations>,
}

#[derive(Deserialize)]
struct HistogramAggregations {
    hist: BucketList,
}

#[derive(Deserialize)]
struct BucketList {
    buckets: Vec<Bucket>,
}

#[derive(Deserialize)]
struct Bucket {
    key: i64,
    doc_count: u64,
}

/// Corpus reader over the analysis index
pub struct OpenSearchCorpus {
    client: OpenSearch,
    index_name: String,
    analysis_field: String,
    date_field: String,
}

impl OpenSearchCorpus {
    pub fn new(config: &OpenSearchConfig, fields: &FieldsConfig) -> Result<Self> {
        Ok(Self::with_client(connect(config)?, &config.index_name, fields))
    }

    pub fn with_client(client: OpenSearch, index_name: &str, fields: &FieldsConfig) -> Self {
        Self {
            client,
            index_name: index_name.to_string(),
            analysis_field: fields.analysis_field.clone(),
            date_field: fields.date_field.clone(),
        }
    }

    fn range_filter(&self, range: DateRange) -> Value {
        json!({ "range": { &self.date_field: { "gt": iso(range.start), "lte": iso(range.end) } } })
    }

    async fn clear_scroll(&self, scroll_id: String) {
        let result = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [scroll_id] }))
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e, "failed to clear scroll context");
        }
    }
}

#[async_trait]
impl CorpusReader for OpenSearchCorpus {
    async fn list_ids(&self, range: DateRange) -> Result<Vec<String>> {
        debug!(start = %range.start, end = %range.end, "retrieving ids");

        let body = json!({
            "size": SCROLL_PAGE_SIZE,
            "_source": false,
            "query": {
                "bool": {
                    "filter": [
                        { "exists": { "field": &self.analysis_field } },
                        self.range_filter(range),
                    ]
                }
            }
        });
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index_name]))
            .scroll(SCROLL_KEEP_ALIVE)
            .body(body)
            .send()
            .await?;
        let mut page: SearchResponse = read_json(response).await?;

        let mut ids = Vec::new();
        loop {
            let done = page.hits.hits.is_empty();
            ids.extend(page.hits.hits.into_iter().map(|hit| hit.id));
            let Some(scroll_id) = page.scroll_id else {
                break;
            };
            if done {
                self.clear_scroll(scroll_id).await;
                break;
            }

            let next: Result<SearchResponse> = async {
                let response = self
                    .client
                    .scroll(ScrollParts::None)
                    .body(json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": &scroll_id }))
                    .send()
                    .await?;
                read_json(response).await
            }
            .await;
            page = match next {
                Ok(next) => next,
                Err(e) => {
                    self.clear_scroll(scroll_id).await;
                    return Err(e);
                }
            };
        }

        Ok(ids)
    }

    async fn term_vectors(&self, ids: &[String]) -> Result<TermVectors> {
        if ids.is_empty() {
            return Ok(TermVectors::new());
        }

        let fields = [self.analysis_field.as_str()];
        let response = self
            .client
            .mtermvectors(MtermvectorsParts::Index(&self.index_name))
            .fields(&fields)
            .field_statistics(false)
            .term_statistics(true)
            .offsets(false)
            .payloads(false)
            .positions(false)
            .realtime(true)
            .body(json!({ "ids": ids }))
            .send()
            .await?;
        let parsed: MtermvectorsResponse = read_json(response).await?;

        let mut vectors = TermVectors::new();
        for mut doc in parsed.docs {
            // documents without the field contribute nothing
            let Some(field) = doc.term_vectors.remove(&self.analysis_field) else {
                continue;
            };
            let terms: DocumentTerms = field
                .terms
                .into_iter()
                .map(|(term, info)| {
                    let entry = TermVectorEntry {
                        term_freq: info.term_freq,
                        doc_freq_estimate: info.doc_freq,
                        term_total_estimate: info.ttf,
                        doc_total_estimate: info.doc_freq,
                    };
                    (term, entry)
                })
                .collect();
            vectors.insert(doc.id, terms);
        }
        Ok(vectors)
    }

    async fn date_histogram(
        &self,
        range: DateRange,
        granularity: Granularity,
        term: Option<&str>,
    ) -> Result<Histogram> {
        let mut query = json!({ "bool": { "filter": [self.range_filter(range)] } });
        if let Some(term) = term {
            query["bool"]["must"] = json!([{ "match_phrase": { &self.analysis_field: term } }]);
        }

        let mut histogram = json!({ "field": &self.date_field, "format": "date_optional_time" });
        match granularity {
            Granularity::Second => histogram["fixed_interval"] = json!("1s"),
            other => histogram["calendar_interval"] = json!(other.as_str()),
        }

        let body = json!({
            "size": 0,
            "query": query,
            "aggs": { "hist": { "date_histogram": histogram } }
        });
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index_name]))
            .body(body)
            .send()
            .await?;
        let parsed: HistogramResponse = read_json(response).await?;

        let Some(aggregations) = parsed.aggregations else {
            return Ok(Histogram::empty());
        };
        let pairs = aggregations
            .hist
            .buckets
            .into_iter()
            .map(|bucket| {
                from_epoch_millis(bucket.key)
                    .map(|at| (at, bucket.doc_count))
                    .ok_or_else(|| Error::contract(format!("invalid bucket key {}", bucket.key)))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(buckets = pairs.len(), term = term.unwrap_or("*"), "date histogram");
        Histogram::from_pairs(pairs)
    }
}
