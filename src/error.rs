//! Unified error handling for the trendwatch crate
//!
//! Every fallible operation in the library returns [`Result`], whose error
//! type is the [`Error`] enum below. The pipeline-level kinds
//! (`BackendContractViolation`, `Alignment`, `Configuration`, `Lookup`) are
//! produced by the analysis code itself; the remaining variants wrap
//! transport failures which are surfaced to the caller unmodified.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trendwatch::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     match err.category() {
//!         ErrorCategory::Config => eprintln!("fix the configuration: {err}"),
//!         _ if err.is_recoverable() => eprintln!("will retry on next schedule: {err}"),
//!         _ => eprintln!("fatal: {err}"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Search backend errors (transport, contract, index maintenance)
    Backend,
    /// Numeric alignment and lookup errors inside the pipeline
    Analysis,
    /// Configuration and validation errors
    Config,
    /// Result cache errors
    Storage,
    /// Outbound HTTP errors (related-term lookup)
    Network,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short lowercase name, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Analysis => "analysis",
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the trendwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// The corpus reader answered with a shape that breaks its contract
    /// (e.g. fewer term vectors than requested identifiers)
    #[error("Backend contract violation: {0}")]
    BackendContractViolation(String),

    /// A term histogram is not contained in the reference histogram
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Invalid parameters (cluster count, windows, thresholds)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A timestamp that must exist in a series was not found
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// OpenSearch transport errors
    #[error("Search backend error: {0}")]
    Backend(#[from] opensearch::Error),

    /// OpenSearch answered with a non-success status or an unexpected body
    #[error("Search backend responded with status {status}: {body}")]
    BackendResponse { status: u16, body: String },

    /// An index administration call was not acknowledged
    #[error("Index maintenance failed: {0}")]
    IndexMaintenance(String),

    /// Redis command errors
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Redis pool errors
    #[error("Cache pool error: {0}")]
    CachePool(#[from] deadpool_redis::PoolError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a backend contract violation
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::BackendContractViolation(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if a later run could succeed without any configuration change
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Backend(_) | Self::Cache(_) | Self::CachePool(_) | Self::Http(_) => true,
            Self::BackendResponse { status, .. } => *status >= 500 || *status == 429,
            Self::Io(_) => true,
            Self::BackendContractViolation(_)
            | Self::Alignment(_)
            | Self::Configuration(_)
            | Self::Lookup(_)
            | Self::IndexMaintenance(_)
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BackendContractViolation(_)
            | Self::Backend(_)
            | Self::BackendResponse { .. }
            | Self::IndexMaintenance(_) => ErrorCategory::Backend,
            Self::Alignment(_) | Self::Lookup(_) => ErrorCategory::Analysis,
            Self::Configuration(_) => ErrorCategory::Config,
            Self::Cache(_) | Self::CachePool(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Http(_) => ErrorCategory::Network,
            Self::Json(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
