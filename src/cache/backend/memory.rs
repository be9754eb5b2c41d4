//! In-Process Distributed Backend
//!
//! DashMap-backed stand-in for a shared cache cluster. Honors TTLs natively
//! like a real backend would, so the store's promotion and write-through paths
//! can run without a network.

use crate::cache::backend::DistributedBackend;
use crate::cache::entry::CacheKey;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Bytes,
    expires_at: Instant,
}

/// Distributed tier held in process memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: DashMap<CacheKey, StoredValue>,
    closed: AtomicBool,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored (possibly expired) values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no values are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::distributed("memory", operation, "backend closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributedBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        self.ensure_open("get")?;

        let live = match self.entries.get(key) {
            None => return Ok(None),
            Some(stored) if stored.expires_at > Instant::now() => Some(stored.value.clone()),
            Some(_) => None,
        };

        if live.is_none() {
            self.entries.remove(key);
        }
        Ok(live)
    }

    async fn set_with_ttl(&self, key: &CacheKey, value: Bytes, ttl_secs: u64) -> Result<()> {
        self.ensure_open("set")?;

        if ttl_secs == 0 {
            self.entries.remove(key);
            return Ok(());
        }

        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(*key, StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        self.ensure_open("delete")?;
        self.entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = InMemoryBackend::new();
        let key = CacheKey::from_content(b"doc");

        assert_eq!(backend.get(&key).await.unwrap(), None);

        backend.set_with_ttl(&key, Bytes::from("value"), 60).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), Some(Bytes::from("value")));
        assert_eq!(backend.len(), 1);

        backend.delete(&key).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let backend = InMemoryBackend::new();
        let key = CacheKey::from_content(b"doc");

        backend.set_with_ttl(&key, Bytes::from("value"), 0).await.unwrap();
        assert!(backend.is_empty());
        assert_eq!(backend.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close() {
        let backend = InMemoryBackend::new();
        backend.close().await.unwrap();
        assert!(backend.is_closed());

        let key = CacheKey::from_content(b"doc");
        assert!(backend.get(&key).await.is_err());
        assert!(backend.set_with_ttl(&key, Bytes::new(), 10).await.is_err());
    }
}
