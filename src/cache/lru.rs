//! LRU Index with TTL Expiration
//!
//! Recency-ordered entry table backing the memory tier. Every structural
//! operation (insert, touch, evict) is O(1); only the maintenance sweep walks
//! the whole table. Not synchronized: `CacheStore` owns it behind one mutex.

use crate::cache::entry::{CacheEntry, CacheKey};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ::lru::LruCache;

// =============================================================================
// Lookup Outcome
// =============================================================================

/// Result of a lookup against the index
#[derive(Debug)]
pub enum IndexLookup {
    /// Live entry; access metadata updated and moved to most-recently-used
    Hit {
        value: Bytes,
        content_type: Option<String>,
    },
    /// Entry existed but had expired; it has been removed
    Expired(CacheEntry),
    /// No entry for the key
    Absent,
}

/// Result of inserting into the index
#[derive(Debug, Default)]
pub struct InsertOutcome {
    /// Whether an existing entry for the key was overwritten
    pub replaced: bool,
    /// Live entry evicted from the least-recently-used position to make room
    pub evicted: Option<CacheEntry>,
    /// Entry removed to make room whose TTL had already elapsed
    pub expired: Option<CacheEntry>,
}

// =============================================================================
// LRU Index
// =============================================================================

/// Capacity-bounded, recency-ordered entry table
pub struct LruIndex {
    /// Entries in recency order (managed by `lru`, unbounded so eviction stays explicit)
    entries: LruCache<CacheKey, CacheEntry>,
    /// Maximum number of entries
    capacity: usize,
}

impl LruIndex {
    /// Create an index holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity: capacity.max(1),
        }
    }

    /// Look up a key, expiring it lazily or touching it on success
    pub fn lookup(&mut self, key: &CacheKey, now: DateTime<Utc>) -> IndexLookup {
        let expired = match self.entries.peek(key) {
            None => return IndexLookup::Absent,
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            return match self.entries.pop(key) {
                Some(entry) => IndexLookup::Expired(entry),
                None => IndexLookup::Absent,
            };
        }

        // get_mut promotes to most-recently-used
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.record_access(now);
                IndexLookup::Hit {
                    value: entry.value.clone(),
                    content_type: entry.content_type.clone(),
                }
            }
            None => IndexLookup::Absent,
        }
    }

    /// Insert or overwrite an entry
    ///
    /// When the key is new and the index is full, the least-recently-used
    /// entry is removed first. It is reported as expired rather than evicted
    /// when its TTL had elapsed by the new entry's `created_at`. Overwrites
    /// never remove anything.
    pub fn insert(&mut self, entry: CacheEntry) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();

        if self.entries.contains(&entry.key) {
            outcome.replaced = true;
        } else if self.entries.len() >= self.capacity {
            match self.entries.pop_lru() {
                Some((_, lru)) if lru.is_expired_at(entry.created_at) => outcome.expired = Some(lru),
                Some((_, lru)) => outcome.evicted = Some(lru),
                None => {}
            }
        }

        self.entries.put(entry.key, entry);
        outcome
    }

    /// Remove an entry regardless of expiry
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    /// Remove every entry whose TTL has elapsed at `now`
    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let expired_keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| *key)
            .collect();

        expired_keys
            .iter()
            .filter_map(|key| self.entries.pop(key))
            .collect()
    }

    /// Check presence without touching recency or expiring
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Read an entry without touching recency
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    /// Keys ordered from least to most recently used
    pub fn keys_lru_order(&self) -> Vec<CacheKey> {
        // lru iterates most-recently-used first
        self.entries.iter().rev().map(|(key, _)| *key).collect()
    }

    /// Current entry count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum entry count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
