//! Analysis index maintenance
//!
//! The trend pipeline reads from a dedicated index whose analysis field is
//! stored with term vectors and a custom analyzer (`trends_analyzer`). This
//! module creates that index, installs the analyzer and mappings, and copies
//! the relevant documents over from the source index with `_reindex`.
//!
//! Changing analysis settings requires the index to be closed, so
//! [`IndexSynchronizer::setup_analyzer`] and
//! [`IndexSynchronizer::setup_mappings`] briefly take the index offline.

use std::path::Path;

use opensearch::indices::{
    IndicesCloseParts, IndicesCreateParts, IndicesExistsParts, IndicesOpenParts,
    IndicesPutMappingParts, IndicesPutSettingsParts,
};
use opensearch::OpenSearch;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::{Config, FieldsConfig, SyncConfig};
use crate::corpus::opensearch::{connect, read_json};
use crate::error::{Error, Result};

/// Name of the custom analyzer installed on the analysis index
pub const ANALYZER_NAME: &str = "trends_analyzer";

/// Outcome of a reindex call
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReindexSummary {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
}

/// Stopwords from a file: one per line, blank lines and `#` comments skipped
#[must_use]
pub fn parse_stopwords(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read and parse a stopwords file
pub fn load_stopwords(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_stopwords(&content))
}

/// Nest a dotted field path into `properties` objects:
/// `a.b` becomes `{"a": {"properties": {"b": leaf}}}`
fn nested_property(field: &str, leaf: Value) -> (String, Value) {
    let mut segments = field.split('.');
    let head = segments.next().unwrap_or(field).to_string();
    let rest: Vec<&str> = segments.collect();

    let value = rest.iter().rev().fold(leaf, |inner, segment| {
        json!({ "properties": { *segment: inner } })
    });
    (head, value)
}

/// Index settings installing the custom analyzer
#[must_use]
pub fn analyzer_settings(sync: &SyncConfig, stopwords: Option<Vec<String>>) -> Value {
    let stopwords = match stopwords {
        Some(words) => json!(words),
        None => json!("_english_"),
    };

    json!({
        "analysis": {
            "analyzer": {
                ANALYZER_NAME: {
                    "type": "custom",
                    "tokenizer": &sync.tokenizer,
                    "char_filter": ["html_strip"],
                    "filter": [
                        "asciifolding",
                        "lowercase",
                        "trends_word_delimiter",
                        "trends_latex_removal",
                        "trends_stopwords",
                        "trends_stemmer",
                        "trends_length",
                        "trends_shingle",
                        "trends_spacing_removal",
                        "trim"
                    ]
                }
            },
            "filter": {
                "trends_word_delimiter": {
                    "type": "word_delimiter",
                    "generate_word_parts": false,
                    "generate_number_parts": true,
                    "catenate_words": true,
                    "catenate_numbers": true,
                    "catenate_all": false,
                    "preserve_original": false,
                    "split_on_case_change": false,
                    "split_on_numerics": false,
                    "stem_english_possessive": true
                },
                "trends_latex_removal": {
                    "type": "pattern_replace",
                    "pattern": "(\\$[^\\$]+\\$)",
                    "replacement": ""
                },
                "trends_spacing_removal": {
                    "type": "pattern_replace",
                    "pattern": "( +)",
                    "replacement": " "
                },
                "trends_stopwords": {
                    "type": "stop",
                    "stopwords": stopwords,
                    "ignore_case": true,
                    "remove_trailing": true
                },
                "trends_stemmer": {
                    "type": "stemmer",
                    "name": "light_english"
                },
                "trends_shingle": {
                    "type": "shingle",
                    "min_shingle_size": sync.minimum_ngram,
                    "max_shingle_size": sync.maximum_ngram,
                    "output_unigrams": sync.unigram,
                    "filler_token": ""
                },
                "trends_length": {
                    "type": "length",
                    "min": 2
                }
            }
        }
    })
}

/// Mappings for the date field and the analyzed text field
#[must_use]
pub fn mappings(fields: &FieldsConfig) -> Value {
    let mut properties = Map::new();

    let (name, date) = nested_property(
        &fields.date_field,
        json!({ "type": "date", "format": "strict_date_optional_time||epoch_millis" }),
    );
    properties.insert(name, date);

    let (name, text) = nested_property(
        &fields.analysis_field,
        json!({ "type": "text", "term_vector": "yes", "analyzer": ANALYZER_NAME }),
    );
    merge_into(&mut properties, name, text);

    json!({ "properties": properties })
}

/// Insert `value` under `name`, merging objects when both fields share a root
fn merge_into(target: &mut Map<String, Value>, name: String, value: Value) {
    match (target.get_mut(&name), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (key, inner) in incoming {
                merge_into(existing, key, inner);
            }
        }
        (_, value) => {
            target.insert(name, value);
        }
    }
}

/// `_reindex` request copying the analysis-relevant part of the source index
#[must_use]
pub fn reindex_body(
    source_index: &str,
    dest_index: &str,
    fields: &FieldsConfig,
    sync: &SyncConfig,
) -> Value {
    let mut filters = vec![
        json!({ "exists": { "field": &fields.analysis_field } }),
        json!({ "exists": { "field": &fields.date_field } }),
    ];

    let mut bounds = Map::new();
    if let Some(min) = &sync.minimum_date {
        bounds.insert("gt".into(), json!(min));
    }
    if let Some(max) = &sync.maximum_date {
        bounds.insert("lte".into(), json!(max));
    }
    if !bounds.is_empty() {
        filters.push(json!({ "range": { &fields.date_field: bounds } }));
    }

    if let Some(script) = &sync.filter_script {
        filters.push(json!({ "script": { "script": { "source": script, "lang": "painless" } } }));
    }

    json!({
        "source": {
            "index": source_index,
            "query": { "bool": { "filter": filters } },
            "_source": [&fields.analysis_field, &fields.date_field, &fields.id_field]
        },
        "dest": { "index": dest_index }
    })
}

/// Maintains the analysis index
pub struct IndexSynchronizer {
    client: OpenSearch,
    index_name: String,
    source_index: String,
    fields: FieldsConfig,
    sync: SyncConfig,
}

impl IndexSynchronizer {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(connect(&config.opensearch)?, config))
    }

    pub fn with_client(client: OpenSearch, config: &Config) -> Self {
        Self {
            client,
            index_name: config.opensearch.index_name.clone(),
            source_index: config.opensearch.source_index.clone(),
            fields: config.fields.clone(),
            sync: config.sync.clone(),
        }
    }

    /// Create the analysis index unless it exists. Returns whether it was created.
    pub async fn setup_index(&self) -> Result<bool> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.index_name]))
            .send()
            .await?;
        if response.status_code().is_success() {
            debug!(index = %self.index_name, "index already exists");
            return Ok(false);
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index_name))
            .send()
            .await?;
        acknowledged(read_json(response).await?, "create index")?;
        info!(index = %self.index_name, "created index");
        Ok(true)
    }

    /// Install the custom analyzer (closes the index meanwhile)
    pub async fn setup_analyzer(&self) -> Result<()> {
        let stopwords = match &self.sync.stopwords_file {
            Some(path) => Some(load_stopwords(path)?),
            None => None,
        };
        let settings = analyzer_settings(&self.sync, stopwords);

        self.close_index().await?;
        let result: Result<()> = async {
            let response = self
                .client
                .indices()
                .put_settings(IndicesPutSettingsParts::Index(&[&self.index_name]))
                .body(settings)
                .send()
                .await?;
            acknowledged(read_json(response).await?, "add analyzer")
        }
        .await;
        // reopen even when the update failed
        self.open_index().await?;
        result?;

        info!(index = %self.index_name, analyzer = ANALYZER_NAME, "set up analyzer");
        Ok(())
    }

    /// Install the date and analysis field mappings (closes the index meanwhile)
    pub async fn setup_mappings(&self) -> Result<()> {
        self.close_index().await?;
        let result: Result<()> = async {
            let response = self
                .client
                .indices()
                .put_mapping(IndicesPutMappingParts::Index(&[&self.index_name]))
                .body(mappings(&self.fields))
                .send()
                .await?;
            acknowledged(read_json(response).await?, "create mappings")
        }
        .await;
        self.open_index().await?;
        result?;

        info!(index = %self.index_name, "set up mappings");
        Ok(())
    }

    /// Copy documents from the source index into the analysis index
    pub async fn synchronize(&self) -> Result<ReindexSummary> {
        info!(source = %self.source_index, dest = %self.index_name, "reindex started");

        let body = reindex_body(&self.source_index, &self.index_name, &self.fields, &self.sync);
        let response = self.client.reindex().body(body).send().await?;
        let summary: ReindexSummary = read_json(response).await?;

        if summary.timed_out {
            return Err(Error::IndexMaintenance(format!(
                "reindex of {} timed out after {} ms",
                self.source_index, summary.took
            )));
        }
        info!(
            created = summary.created,
            updated = summary.updated,
            took_ms = summary.took,
            "reindex finished"
        );
        Ok(summary)
    }

    /// Full maintenance sequence: index, analyzer, mappings, reindex
    pub async fn run(&self) -> Result<ReindexSummary> {
        self.setup_index().await?;
        self.setup_analyzer().await?;
        self.setup_mappings().await?;
        self.synchronize().await
    }

    async fn open_index(&self) -> Result<()> {
        let response = self
            .client
            .indices()
            .open(IndicesOpenParts::Index(&[&self.index_name]))
            .send()
            .await?;
        acknowledged(read_json(response).await?, "open index")?;
        debug!(index = %self.index_name, "opened index");
        Ok(())
    }

    async fn close_index(&self) -> Result<()> {
        let response = self
            .client
            .indices()
            .close(IndicesCloseParts::Index(&[&self.index_name]))
            .send()
            .await?;
        acknowledged(read_json(response).await?, "close index")?;
        debug!(index = %self.index_name, "closed index");
        Ok(())
    }
}

fn acknowledged(response: Value, action: &str) -> Result<()> {
    if response["acknowledged"].as_bool() == Some(true) {
        Ok(())
    } else {
        Err(Error::IndexMaintenance(format!("cannot {action}: {response}")))
    }
}
