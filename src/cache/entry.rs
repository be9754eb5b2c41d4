//! Cache Entry Types
//!
//! Defines content-derived cache keys, entries, and per-set options.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a cache key digest in bytes (SHA-256)
pub const KEY_DIGEST_LEN: usize = 32;

// =============================================================================
// Cache Key
// =============================================================================

/// Deterministic SHA-256 digest of canonicalized content
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey([u8; KEY_DIGEST_LEN]);

impl CacheKey {
    /// Derive a key from raw content bytes
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Derive a key from text, ignoring surrounding whitespace
    pub fn for_text(text: &str) -> Self {
        Self::from_content(text.trim().as_bytes())
    }

    /// Derive a key from a JSON document
    ///
    /// Object keys are serialized in sorted order, so documents that differ
    /// only in field order share a key.
    pub fn for_json(value: &serde_json::Value) -> Self {
        // serde_json::Map is BTreeMap-backed, so to_vec is already key-sorted
        let canonical = serde_json::to_vec(value).unwrap_or_default();
        Self::from_content(&canonical)
    }

    /// Derive a key scoped to a namespace (e.g. "quality", "entities")
    pub fn namespaced(namespace: &str, content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Parse a key from its hex representation
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let digest: [u8; KEY_DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Self(digest))
    }

    /// Hex representation, used as the storage key in the distributed tier
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; KEY_DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps log lines readable
        write!(f, "CacheKey({})", &self.to_hex()[..12])
    }
}

// =============================================================================
// Set Options
// =============================================================================

/// Per-call options for `CacheStore::set_with`
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL override in seconds (None = store default)
    pub ttl_secs: Option<u64>,
    /// Content type hint carried into access events
    pub content_type: Option<String>,
}

impl SetOptions {
    /// Options with only a TTL override
    pub fn ttl(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: Some(ttl_secs),
            content_type: None,
        }
    }

    /// Set the content type hint
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached value with its lifecycle metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key of this entry
    pub key: CacheKey,
    /// Opaque cached value
    pub value: Bytes,
    /// Time when the entry was (last) set
    pub created_at: DateTime<Utc>,
    /// Time when the entry was last returned by a lookup
    pub last_accessed: DateTime<Utc>,
    /// Number of successful lookups since the last set
    pub access_count: u64,
    /// Time-to-live in seconds, measured from `created_at`
    pub ttl_seconds: u64,
    /// Content type hint
    pub content_type: Option<String>,
}

impl CacheEntry {
    /// Create a new entry stamped at `now`
    pub fn new(key: CacheKey, value: Bytes, ttl_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl_seconds,
            content_type: None,
        }
    }

    /// Attach a content type hint
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Record a successful lookup
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    /// Check whether the entry has outlived its TTL at `now`
    ///
    /// A zero TTL is expired on the very next access.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_seconds == 0 {
            return true;
        }
        let age_ms = now.signed_duration_since(self.created_at).num_milliseconds();
        age_ms > (self.ttl_seconds as i64).saturating_mul(1000)
    }

    /// Check whether the entry has expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Age in seconds since creation
    pub fn age_seconds(&self) -> u64 {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.num_seconds().max(0) as u64
    }

    /// Size of the cached value in bytes
    pub fn size_bytes(&self) -> usize {
        self.value.len()
    }
}
