//! Error types for the semantic cache
//!
//! Provides structured error types for the cache store, the distributed tier
//! adapters, configuration loading, and the optimizer.

use thiserror::Error;

/// Unified error type for the cache layer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Caller Errors
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Distributed Tier Errors
    // =========================================================================
    #[error("Distributed tier operation failed: {backend} - {operation}: {reason}")]
    DistributedTier {
        backend: String,
        operation: String,
        reason: String,
    },

    #[error("Distributed tier timeout: {backend} - {operation} after {timeout_ms}ms")]
    DistributedTimeout {
        backend: String,
        operation: String,
        timeout_ms: u64,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Optimizer Errors
    // =========================================================================
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    // =========================================================================
    // Metrics Errors
    // =========================================================================
    #[error("Metrics registration error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a distributed tier failure
    pub fn distributed(
        backend: impl Into<String>,
        operation: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Error::DistributedTier {
            backend: backend.into(),
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error was caused by caller input
    ///
    /// Only these errors ever propagate out of `CacheStore::set`.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this error is transient (infrastructure, safe to ignore or retry later)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::DistributedTier { .. } | Error::DistributedTimeout { .. } | Error::Http(_)
        )
    }
}

/// Result type alias for the cache layer
pub type Result<T> = std::result::Result<T, Error>;
