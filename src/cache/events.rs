//! Access Events
//!
//! One immutable record per cache operation, consumed by the access log and
//! the optimizer.

use crate::cache::entry::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of cache operation an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessEventKind {
    /// Lookup served from the memory tier
    Hit,
    /// Lookup not served from the memory tier
    Miss,
    /// Value stored
    Set,
    /// Entry evicted from the least-recently-used position
    Eviction,
    /// Entry removed because its TTL elapsed
    Expiration,
}

impl AccessEventKind {
    /// Lookups (hits and misses) form the request stream
    pub fn is_request(&self) -> bool {
        matches!(self, AccessEventKind::Hit | AccessEventKind::Miss)
    }

    /// Operations issued by a caller, as opposed to internal housekeeping
    pub fn is_caller_operation(&self) -> bool {
        matches!(
            self,
            AccessEventKind::Hit | AccessEventKind::Miss | AccessEventKind::Set
        )
    }
}

impl std::fmt::Display for AccessEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessEventKind::Hit => write!(f, "hit"),
            AccessEventKind::Miss => write!(f, "miss"),
            AccessEventKind::Set => write!(f, "set"),
            AccessEventKind::Eviction => write!(f, "eviction"),
            AccessEventKind::Expiration => write!(f, "expiration"),
        }
    }
}

/// A recorded cache operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Operation kind
    pub kind: AccessEventKind,
    /// Key the operation touched
    pub key: CacheKey,
    /// When the operation happened
    pub timestamp: DateTime<Utc>,
    /// Wall-clock latency of the operation in milliseconds
    pub latency_ms: f64,
    /// Content type of the entry, when known
    pub content_type: Option<String>,
    /// Set on misses that the distributed tier served
    #[serde(default)]
    pub distributed_hit: bool,
}

impl AccessEvent {
    /// Create an event stamped now
    pub fn new(kind: AccessEventKind, key: CacheKey) -> Self {
        Self::at(kind, key, Utc::now())
    }

    /// Create an event with an explicit timestamp
    pub fn at(kind: AccessEventKind, key: CacheKey, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            key,
            timestamp,
            latency_ms: 0.0,
            content_type: None,
            distributed_hit: false,
        }
    }

    /// Create a Hit event
    pub fn hit(key: CacheKey) -> Self {
        Self::new(AccessEventKind::Hit, key)
    }

    /// Create a Miss event
    pub fn miss(key: CacheKey) -> Self {
        Self::new(AccessEventKind::Miss, key)
    }

    /// Create a Set event
    pub fn set(key: CacheKey) -> Self {
        Self::new(AccessEventKind::Set, key)
    }

    /// Create an Eviction event
    pub fn eviction(key: CacheKey) -> Self {
        Self::new(AccessEventKind::Eviction, key)
    }

    /// Create an Expiration event
    pub fn expiration(key: CacheKey) -> Self {
        Self::new(AccessEventKind::Expiration, key)
    }

    /// Attach a latency measurement
    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Attach a content type
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Mark a miss as served by the distributed tier
    pub fn served_by_distributed(mut self) -> Self {
        self.distributed_hit = true;
        self
    }
}
