//! Semantic Caching Layer
//!
//! A two-tier cache for expensive analysis results, keyed by a digest of the
//! input content:
//! - **Memory tier**: in-process LRU with per-entry TTL
//! - **Distributed tier**: optional network-shared store, consulted on a
//!   memory miss and written through on every set
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                             CacheStore                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────┐        ┌──────────────────────────────────┐  │
//! │  │  Memory tier       │  miss  │  Distributed tier                │  │
//! │  │  LruIndex + TTL    │ ─────► │  Noop | InMemory | Http          │  │
//! │  │  (one mutex)       │ ◄───── │  (per-call timeout, never fatal) │  │
//! │  └────────────────────┘promote └──────────────────────────────────┘  │
//! │            │                                                         │
//! │            ▼ every operation                                         │
//! │  ┌────────────────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │  AccessEventLog    │   │ CacheMetrics │   │ broadcast channel  │  │
//! │  └────────────────────┘   └──────────────┘   └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use semantic_cache::cache::{CacheConfig, CacheStore};
//!
//! let store = CacheStore::memory_only(CacheConfig::default())?;
//! store.set("What is a B-tree?", answer_bytes).await?;
//!
//! if let Some(answer) = store.get("What is a B-tree?").await.into_value() {
//!     // served from cache
//! }
//! ```

pub mod access_log;
pub mod backend;
pub mod entry;
pub mod events;
pub mod lru;
pub mod metrics;
pub mod store;
pub mod warm;

// Re-export main types
pub use access_log::AccessEventLog;
pub use backend::{
    BackendFactory, BackendKind, DistributedBackend, DistributedBackendRef, DistributedConfig,
    HttpBackend, HttpBackendConfig, InMemoryBackend, NoopBackend,
};
pub use entry::{CacheEntry, CacheKey, SetOptions};
pub use events::{AccessEvent, AccessEventKind};
pub use metrics::{
    CacheHealth, CacheMetrics, CacheMetricsCollector, CacheMetricsExporter, CacheMetricsSnapshot,
    MetricsCounters, MetricsReport,
};
pub use store::{CacheConfig, CacheStore};
pub use warm::{WarmConfig, WarmSummary};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// =============================================================================
// Cache Lookup Result
// =============================================================================

/// Tier that served a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    /// In-process LRU
    Memory,
    /// Distributed tier (value was promoted into memory)
    Distributed,
}

impl std::fmt::Display for LookupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupSource::Memory => write!(f, "memory"),
            LookupSource::Distributed => write!(f, "distributed"),
        }
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Value found
    Hit {
        /// The cached value
        value: Bytes,
        /// Tier that served it
        source: LookupSource,
    },
    /// Not cached, expired, or the distributed tier was unavailable
    Miss,
}

impl CacheLookup {
    /// Check if this is a hit
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit { .. })
    }

    /// Check if this is a miss
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }

    /// Borrow the value if this is a hit
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            CacheLookup::Hit { value, .. } => Some(value),
            CacheLookup::Miss => None,
        }
    }

    /// Take the value if this is a hit
    pub fn into_value(self) -> Option<Bytes> {
        match self {
            CacheLookup::Hit { value, .. } => Some(value),
            CacheLookup::Miss => None,
        }
    }

    /// Tier that served the hit
    pub fn source(&self) -> Option<LookupSource> {
        match self {
            CacheLookup::Hit { source, .. } => Some(*source),
            CacheLookup::Miss => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accessors() {
        let hit = CacheLookup::Hit {
            value: Bytes::from("v"),
            source: LookupSource::Distributed,
        };
        assert!(hit.is_hit());
        assert_eq!(hit.source(), Some(LookupSource::Distributed));
        assert_eq!(hit.value(), Some(&Bytes::from("v")));
        assert_eq!(hit.into_value(), Some(Bytes::from("v")));

        let miss = CacheLookup::Miss;
        assert!(miss.is_miss());
        assert_eq!(miss.source(), None);
        assert_eq!(miss.into_value(), None);
    }
}
