//! Latest trend result cache
//!
//! Each pipeline run publishes one [`TrendResult`] under a single key; the
//! next run overwrites it. There is no history and no expiry. Readers (the
//! `show` command, dashboards) only ever see the last complete record.
//!
//! # Example
//!
//! ```rust,ignore
//! use trendwatch::cache::{CacheConfig, RedisTrendStore, TrendStore};
//!
//! let store = RedisTrendStore::new(&CacheConfig::default()).await?;
//! if let Some(latest) = store.latest().await? {
//!     println!("{}", latest.terms.join(", "));
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::analysis::granularity::Granularity;
use crate::error::{Error, Result};

/// Default key of the "latest result" record
pub const DEFAULT_CACHE_KEY: &str = "trends:latest";

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis URL (e.g., redis://localhost:6379/0)
    pub url: String,

    /// Connection pool size
    pub pool_size: usize,

    /// Key of the single "latest result" record
    pub key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            pool_size: 4,
            key: DEFAULT_CACHE_KEY.to_string(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("REDIS_URL").unwrap_or(defaults.url),
            pool_size: std::env::var("REDIS_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            key: std::env::var("TRENDS_CACHE_KEY").unwrap_or(defaults.key),
        }
    }
}

/// Published outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TrendRecord", from = "TrendRecord")]
pub struct TrendResult {
    /// Trending terms, best first
    pub terms: Vec<String>,
    /// Start of the foreground window
    pub start: DateTime<Utc>,
    /// Reference date of the run
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

impl TrendResult {
    /// Encode to the cached JSON record
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a cached JSON record
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Wire shape of the cached record: terms are comma-joined
#[derive(Serialize, Deserialize)]
struct TrendRecord {
    terms: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
}

impl From<TrendResult> for TrendRecord {
    fn from(result: TrendResult) -> Self {
        Self {
            terms: result.terms.join(","),
            start: result.start,
            end: result.end,
            granularity: result.granularity,
        }
    }
}

impl From<TrendRecord> for TrendResult {
    fn from(record: TrendRecord) -> Self {
        Self {
            terms: record
                .terms
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            start: record.start,
            end: record.end,
            granularity: record.granularity,
        }
    }
}

/// Storage for the single "latest result" record
#[async_trait]
pub trait TrendStore: Send + Sync {
    /// Overwrite the latest record in one step; last writer wins
    async fn publish(&self, result: &TrendResult) -> Result<()>;

    /// Read the latest record, if any run has published one
    async fn latest(&self) -> Result<Option<TrendResult>>;
}

/// Redis-backed trend store
pub struct RedisTrendStore {
    pool: Pool,
    key: String,
}

impl RedisTrendStore {
    /// Create a store and verify the connection
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        let pool = PoolConfig::from_url(&config.url)
            .builder()
            .map_err(|e| Error::with_source("Failed to create Redis pool builder", e))?
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| Error::with_source("Failed to create Redis connection pool", e))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;

        tracing::info!(url = %config.url, key = %config.key, "Connected to Redis");

        Ok(Self {
            pool,
            key: config.key.clone(),
        })
    }

    /// Create a store, returning None if Redis is unavailable
    pub async fn try_new(config: &CacheConfig) -> Option<Self> {
        match Self::new(config).await {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable");
                None
            }
        }
    }

    /// Check if Redis answers
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let result: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(result == "PONG")
    }
}

#[async_trait]
impl TrendStore for RedisTrendStore {
    async fn publish(&self, result: &TrendResult) -> Result<()> {
        let payload = result.to_json()?;
        let mut conn = self.pool.get().await?;
        conn.set::<_, _, ()>(&self.key, payload).await?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<TrendResult>> {
        let mut conn = self.pool.get().await?;
        let payload: Option<String> = conn.get(&self.key).await?;
        payload.as_deref().map(TrendResult::from_json).transpose()
    }
}

/// In-process trend store
#[derive(Default)]
pub struct MemoryTrendStore {
    record: RwLock<Option<String>>,
}

impl MemoryTrendStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON record as it would be stored in Redis
    pub async fn raw(&self) -> Option<String> {
        self.record.read().await.clone()
    }
}

#[async_trait]
impl TrendStore for MemoryTrendStore {
    async fn publish(&self, result: &TrendResult) -> Result<()> {
        let payload = result.to_json()?;
        *self.record.write().await = Some(payload);
        Ok(())
    }

    async fn latest(&self) -> Result<Option<TrendResult>> {
        self.record
            .read()
            .await
            .as_deref()
            .map(TrendResult::from_json)
            .transpose()
    }
}
