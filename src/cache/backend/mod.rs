//! Distributed Tier Backends
//!
//! The secondary tier consulted on a memory miss and written through on every
//! set. Backends are selected once, at construction, and every call is
//! allowed to fail: `CacheStore` absorbs errors and timeouts.

mod http;
mod memory;

pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::InMemoryBackend;

use crate::cache::entry::CacheKey;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default per-call timeout for distributed tier operations
pub const DEFAULT_DISTRIBUTED_TIMEOUT_MS: u64 = 200;

// =============================================================================
// DistributedBackend Trait
// =============================================================================

/// Network-reachable key/value store with native TTL support
///
/// Implementations only move bytes; they never see the cache's LRU state.
#[async_trait]
pub trait DistributedBackend: Send + Sync {
    /// Short backend name used in logs and errors
    fn name(&self) -> &str;

    /// Fetch a value; `Ok(None)` when the key is absent or expired
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>>;

    /// Store a value that the backend expires after `ttl_secs`
    async fn set_with_ttl(&self, key: &CacheKey, value: Bytes, ttl_secs: u64) -> Result<()>;

    /// Remove a value; backends without explicit removal let it expire
    async fn delete(&self, _key: &CacheKey) -> Result<()> {
        Ok(())
    }

    /// Release connections; later calls may fail
    async fn close(&self) -> Result<()>;
}

/// Shared handle to a backend
pub type DistributedBackendRef = Arc<dyn DistributedBackend>;

// =============================================================================
// No-op Backend
// =============================================================================

/// Backend used when no distributed tier is configured: always misses
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

#[async_trait]
impl DistributedBackend for NoopBackend {
    fn name(&self) -> &str {
        "noop"
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<Bytes>> {
        Ok(None)
    }

    async fn set_with_ttl(&self, _key: &CacheKey, _value: Bytes, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Configuration & Factory
// =============================================================================

/// Which distributed backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// No distributed tier
    #[default]
    None,
    /// In-process map, for tests and single-node deployments
    Memory,
    /// REST key/value gateway
    Http,
}

/// Distributed tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedConfig {
    /// Backend to build
    pub backend: BackendKind,
    /// Gateway base URL (Http only)
    pub endpoint: String,
    /// Prefix prepended to every storage key
    pub key_prefix: String,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::None,
            endpoint: "http://cache-gateway:8080/kv".to_string(),
            key_prefix: "semantic-cache:".to_string(),
            timeout_ms: DEFAULT_DISTRIBUTED_TIMEOUT_MS,
        }
    }
}

impl DistributedConfig {
    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Builds the configured backend
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend selected by `config`
    pub fn create(config: &DistributedConfig) -> Result<DistributedBackendRef> {
        match config.backend {
            BackendKind::None => Ok(Arc::new(NoopBackend)),
            BackendKind::Memory => Ok(Arc::new(InMemoryBackend::new())),
            BackendKind::Http => {
                if config.timeout_ms == 0 {
                    return Err(Error::Configuration(
                        "distributed timeout_ms must be positive".to_string(),
                    ));
                }
                let backend = HttpBackend::new(HttpBackendConfig {
                    endpoint: config.endpoint.clone(),
                    key_prefix: config.key_prefix.clone(),
                    timeout: config.timeout(),
                })?;
                Ok(Arc::new(backend))
            }
        }
    }
}
