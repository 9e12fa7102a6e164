//! Configuration management for trendwatch
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Every section has defaults, so a file only needs
//! to name what it changes.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::detector::PipelineParams;
use crate::analysis::granularity::Granularity;
use crate::cache::CacheConfig;
use crate::error::Error;
use crate::utils::parse_iso_date;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenSearch configuration
    pub opensearch: OpenSearchConfig,

    /// Document field names
    pub fields: FieldsConfig,

    /// Trend pipeline parameters
    pub trends: TrendsConfig,

    /// Index synchronization
    pub sync: SyncConfig,

    /// Result cache
    pub cache: CacheConfig,

    /// Related-term lookup
    pub related: RelatedConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// OpenSearch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSearchConfig {
    /// OpenSearch endpoint URL
    pub url: String,

    /// Analysis index the pipeline reads from
    pub index_name: String,

    /// Index the analysis index is synchronized from
    pub source_index: String,

    /// Username (optional)
    pub username: Option<String>,

    /// Password (optional)
    pub password: Option<String>,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9200"),
            index_name: String::from("records-trends"),
            source_index: String::from("records-hep"),
            username: None,
            password: None,
        }
    }
}

/// Document field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    /// Text field whose vocabulary is analyzed (dotted path)
    pub analysis_field: String,

    /// Date field used for windows and histograms
    pub date_field: String,

    /// Record identifier field
    pub id_field: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            analysis_field: String::from("abstracts.value"),
            date_field: String::from("earliest_date"),
            id_field: String::from("self_recid"),
        }
    }
}

/// Trend pipeline parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    /// Histogram bucket unit
    pub granularity: Granularity,

    /// Foreground length, in buckets
    pub foreground_window: u32,

    /// Background length, in buckets
    pub background_window: u32,

    /// Minimum number of foreground documents a term must appear in
    pub minimum_frequency_threshold: u64,

    /// Moving-sum window, in buckets
    pub smoothing_len: usize,

    /// Number of k-means clusters
    pub num_cluster: usize,

    /// Number of trends kept after pruning
    pub num_trends: usize,

    /// Identifiers per term-vector request
    pub term_vector_batch: usize,

    /// Concurrent per-term histogram requests
    pub histogram_concurrency: usize,

    /// Seed for k-means++ initialization; deterministic seeding when absent
    pub cluster_seed: Option<u64>,

    /// Daily run time, `HH:MM` in UTC
    pub schedule_time: String,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        let params = PipelineParams::default();
        Self {
            granularity: params.granularity,
            foreground_window: params.foreground_window,
            background_window: params.background_window,
            minimum_frequency_threshold: params.minimum_frequency_threshold,
            smoothing_len: params.smoothing_len,
            num_cluster: params.num_cluster,
            num_trends: params.num_trends,
            term_vector_batch: params.term_vector_batch,
            histogram_concurrency: params.histogram_concurrency,
            cluster_seed: params.cluster_seed,
            schedule_time: String::from("03:00"),
        }
    }
}

impl TrendsConfig {
    /// Pipeline parameters for a run
    #[must_use]
    pub fn pipeline_params(&self) -> PipelineParams {
        PipelineParams {
            granularity: self.granularity,
            foreground_window: self.foreground_window,
            background_window: self.background_window,
            minimum_frequency_threshold: self.minimum_frequency_threshold,
            smoothing_len: self.smoothing_len,
            num_cluster: self.num_cluster,
            num_trends: self.num_trends,
            term_vector_batch: self.term_vector_batch,
            histogram_concurrency: self.histogram_concurrency,
            cluster_seed: self.cluster_seed,
        }
    }

    /// Parsed daily run time
    pub fn schedule_time(&self) -> crate::error::Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.schedule_time, "%H:%M").map_err(|_| {
            Error::config(format!(
                "schedule_time must be HH:MM, got '{}'",
                self.schedule_time
            ))
        })
    }
}

/// Index synchronization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Tokenizer of the custom analyzer
    pub tokenizer: String,

    /// Only documents dated after this are copied
    pub minimum_date: Option<String>,

    /// Only documents dated up to this are copied
    pub maximum_date: Option<String>,

    /// Painless filter applied to source documents
    pub filter_script: Option<String>,

    /// Emit single tokens alongside shingles
    pub unigram: bool,

    pub minimum_ngram: u32,

    pub maximum_ngram: u32,

    /// One stopword per line, `#` comments allowed
    pub stopwords_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tokenizer: String::from("icu_tokenizer"),
            minimum_date: Some(String::from("2013-02-01")),
            maximum_date: None,
            filter_script: Some(String::from(
                "d = doc['earliest_date'].date; d.getDayOfYear() != 1",
            )),
            unigram: true,
            minimum_ngram: 2,
            maximum_ngram: 3,
            stopwords_file: None,
        }
    }
}

/// Related-term lookup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedConfig {
    pub enabled: bool,

    /// Base URL of the word-similarity service
    pub url: String,

    /// Model corpus queried on the service
    pub corpus: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum related terms per trend
    pub limit: usize,
}

impl Default for RelatedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::from("http://magpie.inspirehep.net/api"),
            corpus: String::from("keywords"),
            timeout_secs: 5,
            limit: 5,
        }
    }
}

impl RelatedConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("OPENSEARCH_URL") {
            config.opensearch.url = url;
        }
        if let Ok(index) = std::env::var("TRENDWATCH_INDEX") {
            config.opensearch.index_name = index;
        }
        if let Ok(index) = std::env::var("TRENDWATCH_SOURCE_INDEX") {
            config.opensearch.source_index = index;
        }
        config.opensearch.username = std::env::var("OPENSEARCH_USERNAME").ok();
        config.opensearch.password = std::env::var("OPENSEARCH_PASSWORD").ok();

        if let Ok(field) = std::env::var("TRENDWATCH_ANALYSIS_FIELD") {
            config.fields.analysis_field = field;
        }
        if let Ok(field) = std::env::var("TRENDWATCH_DATE_FIELD") {
            config.fields.date_field = field;
        }

        if let Ok(granularity) = std::env::var("TRENDWATCH_GRANULARITY") {
            config.trends.granularity = granularity
                .parse()
                .context("Invalid TRENDWATCH_GRANULARITY")?;
        }
        let trends = &mut config.trends;
        trends.foreground_window =
            env_parse("TRENDWATCH_FOREGROUND_WINDOW").unwrap_or(trends.foreground_window);
        trends.background_window =
            env_parse("TRENDWATCH_BACKGROUND_WINDOW").unwrap_or(trends.background_window);
        trends.minimum_frequency_threshold = env_parse("TRENDWATCH_MIN_FREQUENCY")
            .unwrap_or(trends.minimum_frequency_threshold);
        trends.smoothing_len = env_parse("TRENDWATCH_SMOOTHING_LEN").unwrap_or(trends.smoothing_len);
        trends.num_cluster = env_parse("TRENDWATCH_NUM_CLUSTER").unwrap_or(trends.num_cluster);
        trends.num_trends = env_parse("TRENDWATCH_NUM_TRENDS").unwrap_or(trends.num_trends);
        trends.cluster_seed = env_parse("TRENDWATCH_CLUSTER_SEED").or(trends.cluster_seed);

        config.cache = CacheConfig::from_env();

        if let Ok(url) = std::env::var("MAGPIE_API_URL") {
            config.related.url = url;
            config.related.enabled = true;
        }

        if let Ok(level) = std::env::var("TRENDWATCH_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("TRENDWATCH_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        self.trends.pipeline_params().validate()?;
        self.trends.schedule_time()?;

        let s = &self.sync;
        if s.minimum_ngram == 0 || s.minimum_ngram > s.maximum_ngram {
            return Err(Error::config(
                "minimum_ngram must be between 1 and maximum_ngram",
            ));
        }
        for date in [&s.minimum_date, &s.maximum_date].into_iter().flatten() {
            parse_iso_date(date).map_err(|e| Error::config(e.to_string()))?;
        }

        if self.cache.key.is_empty() {
            return Err(Error::config("cache key must not be empty"));
        }

        Ok(())
    }
}
