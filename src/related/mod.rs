//! Related-term lookup
//!
//! Trends can be decorated with semantically close words from a word2vec
//! service (Magpie). The lookup is optional: callers go through
//! [`related_or_empty`], which turns every failure into an empty list.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RelatedConfig;
use crate::error::{Error, Result};

/// Source of terms related to a given term
#[async_trait]
pub trait RelatedTerms: Send + Sync {
    /// Terms close to `term`, most similar first
    async fn related(&self, term: &str) -> Result<Vec<String>>;
}

#[derive(Serialize)]
struct Word2VecRequest<'a> {
    corpus: &'a str,
    positive: [&'a str; 1],
}

#[derive(Deserialize)]
struct Word2VecResponse {
    #[serde(default)]
    vector: Vec<(String, f64)>,
}

/// HTTP client of the Magpie word2vec endpoint
pub struct MagpieClient {
    client: reqwest::Client,
    endpoint: String,
    corpus: String,
    limit: usize,
}

impl MagpieClient {
    pub fn new(config: &RelatedConfig) -> Result<Self> {
        Self::with_timeout(config, config.timeout())
    }

    pub fn with_timeout(config: &RelatedConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/word2vec", config.url.trim_end_matches('/')),
            corpus: config.corpus.clone(),
            limit: config.limit,
        })
    }
}

#[async_trait]
impl RelatedTerms for MagpieClient {
    async fn related(&self, term: &str) -> Result<Vec<String>> {
        let request = Word2VecRequest {
            corpus: &self.corpus,
            positive: [term],
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::other(format!(
                "word2vec lookup for '{term}' failed with status {status}"
            )));
        }

        let body: Word2VecResponse = response.json().await?;
        Ok(body
            .vector
            .into_iter()
            .map(|(word, _score)| word)
            .filter(|word| word != term)
            .take(self.limit)
            .collect())
    }
}

/// Related terms, or an empty list when the lookup fails for any reason
pub async fn related_or_empty<R: RelatedTerms + ?Sized>(lookup: &R, term: &str) -> Vec<String> {
    match lookup.related(term).await {
        Ok(terms) => terms,
        Err(e) => {
            warn!(%term, error = %e, "related-term lookup failed");
            Vec::new()
        }
    }
}
