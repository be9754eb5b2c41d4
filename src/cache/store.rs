//! Cache Store
//!
//! The memory tier (LRU + TTL) fronting an optional distributed tier.
//!
//! Locking discipline:
//! - Every structural change to the entry table happens under one
//!   `parking_lot::Mutex<LruIndex>`; each critical section is O(1) except the
//!   maintenance sweep.
//! - The lock is never held across an `.await`. Distributed tier calls, event
//!   log appends and broadcasts all happen after it is released.
//! - Distributed tier calls are bounded by a per-call timeout and every
//!   failure degrades to memory-only behavior for that call.

use crate::cache::access_log::AccessEventLog;
use crate::cache::backend::{
    BackendFactory, DistributedBackendRef, NoopBackend, DEFAULT_DISTRIBUTED_TIMEOUT_MS,
};
use crate::cache::entry::{CacheEntry, CacheKey, SetOptions};
use crate::cache::events::{AccessEvent, AccessEventKind};
use crate::cache::lru::{IndexLookup, InsertOutcome, LruIndex};
use crate::cache::metrics::{
    CacheMetrics, CacheMetricsCollector, CacheMetricsSnapshot, MetricsReport,
    DEFAULT_HEALTHY_HIT_RATE_FLOOR,
};
use crate::cache::warm::{self, WarmConfig, WarmSummary};
use crate::cache::{CacheLookup, LookupSource};
use crate::config::SemanticCacheConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the cache store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries in the memory tier
    pub max_size: usize,
    /// TTL applied when a set carries no override
    pub default_ttl_secs: u64,
    /// Largest TTL a caller may request
    pub max_ttl_secs: u64,
    /// Largest value a caller may store
    pub max_value_bytes: usize,
    /// How long access events are retained
    pub event_retention_secs: u64,
    /// Hard cap on retained access events
    pub max_events: usize,
    /// Period of the expiration sweep (0 = no background sweep)
    pub maintenance_interval_secs: u64,
    /// Hit rate above which the cache reports healthy
    pub healthy_hit_rate_floor: f64,
    /// Capacity of the access event broadcast channel
    pub event_channel_capacity: usize,
    /// Warming pool configuration
    pub warm: WarmConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            default_ttl_secs: 3600,
            max_ttl_secs: 7 * 24 * 3600,
            max_value_bytes: 8 * 1024 * 1024,
            event_retention_secs: crate::cache::access_log::DEFAULT_RETENTION_SECS,
            max_events: crate::cache::access_log::DEFAULT_MAX_EVENTS,
            maintenance_interval_secs: 60,
            healthy_hit_rate_floor: DEFAULT_HEALTHY_HIT_RATE_FLOOR,
            event_channel_capacity: 1024,
            warm: WarmConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Reject configurations the store cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::Configuration("cache.max_size must be positive".into()));
        }
        if self.default_ttl_secs > self.max_ttl_secs {
            return Err(Error::Configuration(format!(
                "cache.default_ttl_secs ({}) exceeds cache.max_ttl_secs ({})",
                self.default_ttl_secs, self.max_ttl_secs
            )));
        }
        if self.max_value_bytes == 0 {
            return Err(Error::Configuration(
                "cache.max_value_bytes must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.healthy_hit_rate_floor) {
            return Err(Error::Configuration(format!(
                "cache.healthy_hit_rate_floor must be within [0, 1], got {}",
                self.healthy_hit_rate_floor
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Configuration(
                "cache.event_channel_capacity must be positive".into(),
            ));
        }
        if self.warm.max_concurrent == 0 {
            return Err(Error::Configuration(
                "cache.warm.max_concurrent must be positive".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Cache Store
// =============================================================================

/// Two-tier semantic cache: in-process LRU with TTL, plus a distributed tier
pub struct CacheStore {
    /// Entry table, the only structurally mutable state
    index: Mutex<LruIndex>,
    /// Secondary tier
    backend: DistributedBackendRef,
    /// Per-call distributed tier timeout
    distributed_timeout: Duration,
    /// Cumulative counters
    metrics: CacheMetrics,
    /// Derives rates and health from the counters
    collector: CacheMetricsCollector,
    /// Access history for the optimizer
    access_log: Arc<AccessEventLog>,
    /// Event broadcaster
    event_tx: broadcast::Sender<AccessEvent>,
    /// Stops background maintenance
    shutdown: CancellationToken,
    /// Background maintenance task
    maintenance: Mutex<Option<JoinHandle<()>>>,
    /// Configuration
    config: CacheConfig,
}

impl CacheStore {
    /// Create a store over `backend` with the default distributed timeout
    pub fn new(config: CacheConfig, backend: DistributedBackendRef) -> Result<Arc<Self>> {
        Self::with_distributed_timeout(
            config,
            backend,
            Duration::from_millis(DEFAULT_DISTRIBUTED_TIMEOUT_MS),
        )
    }

    /// Create a memory-only store
    pub fn memory_only(config: CacheConfig) -> Result<Arc<Self>> {
        Self::new(config, Arc::new(NoopBackend))
    }

    /// Create a store with an explicit per-call distributed timeout
    pub fn with_distributed_timeout(
        config: CacheConfig,
        backend: DistributedBackendRef,
        distributed_timeout: Duration,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let store = Arc::new(Self {
            index: Mutex::new(LruIndex::new(config.max_size)),
            backend,
            distributed_timeout,
            metrics: CacheMetrics::new(),
            collector: CacheMetricsCollector::new(config.healthy_hit_rate_floor),
            access_log: Arc::new(AccessEventLog::with_limits(
                config.event_retention_secs,
                config.max_events,
            )),
            event_tx,
            shutdown: CancellationToken::new(),
            maintenance: Mutex::new(None),
            config,
        });

        info!(
            max_size = store.config.max_size,
            default_ttl_secs = store.config.default_ttl_secs,
            backend = store.backend.name(),
            "Cache store initialized"
        );
        Ok(store)
    }

    /// Build the store and its backend from a full configuration
    pub fn from_config(config: &SemanticCacheConfig) -> Result<Arc<Self>> {
        let backend = BackendFactory::create(&config.distributed)?;
        Self::with_distributed_timeout(config.cache.clone(), backend, config.distributed.timeout())
    }

    /// Store configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Name of the distributed backend in use
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Look up the value cached for `content`
    pub async fn get(&self, content: impl AsRef<[u8]>) -> CacheLookup {
        self.get_by_key(&CacheKey::from_content(content.as_ref())).await
    }

    /// Look up a value by precomputed key
    ///
    /// Never fails: expiration, absence and distributed tier outages all
    /// present as `CacheLookup::Miss`.
    pub async fn get_by_key(&self, key: &CacheKey) -> CacheLookup {
        let started = Instant::now();
        let now = Utc::now();

        let outcome = self.index.lock().lookup(key, now);
        let content_type = match outcome {
            IndexLookup::Hit {
                value,
                content_type,
            } => {
                self.metrics.record_hit();
                self.emit(
                    AccessEvent::at(AccessEventKind::Hit, *key, now)
                        .with_latency_ms(elapsed_ms(started))
                        .with_content_type(content_type),
                );
                debug!(key = %key, "Memory tier hit");
                return CacheLookup::Hit {
                    value,
                    source: LookupSource::Memory,
                };
            }
            IndexLookup::Expired(entry) => {
                self.metrics.record_expirations(1);
                self.emit(
                    AccessEvent::at(AccessEventKind::Expiration, *key, now)
                        .with_content_type(entry.content_type.clone()),
                );
                debug!(key = %key, ttl_secs = entry.ttl_seconds, "Entry expired on access");
                entry.content_type
            }
            IndexLookup::Absent => None,
        };

        self.metrics.record_miss();

        match self.distributed_get(key).await {
            Some(value) => {
                self.promote(key, value.clone(), content_type.clone());
                self.emit(
                    AccessEvent::at(AccessEventKind::Miss, *key, now)
                        .with_latency_ms(elapsed_ms(started))
                        .with_content_type(content_type)
                        .served_by_distributed(),
                );
                CacheLookup::Hit {
                    value,
                    source: LookupSource::Distributed,
                }
            }
            None => {
                self.emit(
                    AccessEvent::at(AccessEventKind::Miss, *key, now)
                        .with_latency_ms(elapsed_ms(started))
                        .with_content_type(content_type),
                );
                CacheLookup::Miss
            }
        }
    }

    /// Whether a live entry for `content` is in the memory tier
    ///
    /// Does not touch recency, record events, or consult the distributed tier.
    pub fn contains(&self, content: impl AsRef<[u8]>) -> bool {
        let key = CacheKey::from_content(content.as_ref());
        self.index
            .lock()
            .peek(&key)
            .map(|entry| !entry.is_expired_at(Utc::now()))
            .unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Cache `value` for `content` with the default TTL
    pub async fn set(&self, content: impl AsRef<[u8]>, value: impl Into<Bytes>) -> Result<()> {
        self.set_with(content, value, SetOptions::default()).await
    }

    /// Cache `value` for `content` with per-call options
    pub async fn set_with(
        &self,
        content: impl AsRef<[u8]>,
        value: impl Into<Bytes>,
        options: SetOptions,
    ) -> Result<()> {
        let key = CacheKey::from_content(content.as_ref());
        self.set_key(key, value.into(), options).await
    }

    /// Cache `value` under a precomputed key
    ///
    /// Only caller input is validated; distributed write-through failures are
    /// logged and absorbed.
    pub async fn set_key(&self, key: CacheKey, value: Bytes, options: SetOptions) -> Result<()> {
        let ttl_secs = options.ttl_secs.unwrap_or(self.config.default_ttl_secs);
        if ttl_secs > self.config.max_ttl_secs {
            return Err(Error::Validation(format!(
                "ttl {}s exceeds maximum {}s",
                ttl_secs, self.config.max_ttl_secs
            )));
        }
        if value.len() > self.config.max_value_bytes {
            return Err(Error::Validation(format!(
                "value of {} bytes exceeds maximum {} bytes",
                value.len(),
                self.config.max_value_bytes
            )));
        }

        let started = Instant::now();
        let now = Utc::now();
        let entry = CacheEntry::new(key, value.clone(), ttl_secs, now)
            .with_content_type(options.content_type.clone());

        let (outcome, size) = {
            let mut index = self.index.lock();
            let outcome = index.insert(entry);
            (outcome, index.len())
        };
        self.check_capacity(size);

        self.metrics.record_set();
        let replaced = outcome.replaced;
        self.record_displaced(outcome, now);

        self.distributed_set(&key, value, ttl_secs).await;

        self.emit(
            AccessEvent::at(AccessEventKind::Set, key, now)
                .with_latency_ms(elapsed_ms(started))
                .with_content_type(options.content_type),
        );
        debug!(key = %key, ttl_secs, replaced, "Cached value");
        Ok(())
    }

    /// Remove the entry for `content` from both tiers
    ///
    /// Returns whether the memory tier held it.
    pub async fn delete(&self, content: impl AsRef<[u8]>) -> bool {
        let key = CacheKey::from_content(content.as_ref());
        let removed = self.index.lock().remove(&key).is_some();

        match tokio::time::timeout(self.distributed_timeout, self.backend.delete(&key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.absorb_distributed_failure(&e),
            Err(_) => self.absorb_distributed_failure(&self.timeout_error("delete")),
        }

        debug!(key = %key, removed, "Deleted cache entry");
        removed
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Remove every expired entry; returns how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let expired = self.index.lock().remove_expired(now);
        let count = expired.len();

        if count > 0 {
            self.metrics.record_expirations(count as u64);
            for entry in expired {
                self.emit(
                    AccessEvent::at(AccessEventKind::Expiration, entry.key, now)
                        .with_content_type(entry.content_type),
                );
            }
            debug!(count, "Swept expired entries");
        }
        count
    }

    /// Compute and cache a value for every sample
    ///
    /// Samples are drained by a bounded worker pool; failures are counted
    /// without aborting the batch. Returns once the batch completes or the
    /// configured deadline elapses.
    pub async fn warm<F, Fut>(&self, samples: Vec<Bytes>, compute: F) -> WarmSummary
    where
        F: Fn(Bytes) -> Fut,
        Fut: Future<Output = anyhow::Result<Bytes>>,
    {
        let compute = &compute;
        let summary = warm::run_pool(samples, &self.config.warm, move |content: Bytes| async move {
            let value = compute(content.clone()).await?;
            self.set(&content, value).await?;
            Ok(())
        })
        .await;

        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "Cache warm completed"
        );
        summary
    }

    /// Empty the memory tier and reset the counters
    ///
    /// The access log is kept so historical analysis stays possible.
    pub fn clear(&self) {
        let mut index = self.index.lock();
        index.clear();
        self.metrics.reset();
        drop(index);
        info!("Cache cleared");
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Counters plus derived rates, utilization, and health
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        let size = self.len();
        self.collector
            .collect(self.metrics.counters(), size, self.config.max_size)
    }

    /// Flat, serialization-ready metrics
    pub fn get_metrics(&self) -> MetricsReport {
        self.metrics_snapshot().report()
    }

    /// Shared handle to the access event log
    pub fn access_log(&self) -> Arc<AccessEventLog> {
        Arc::clone(&self.access_log)
    }

    /// Subscribe to access events as they are recorded
    pub fn subscribe(&self) -> broadcast::Receiver<AccessEvent> {
        self.event_tx.subscribe()
    }

    /// Number of entries in the memory tier (expired ones included until purged)
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    /// Whether the memory tier is empty
    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    /// Configured capacity
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Keys ordered from least to most recently used
    pub fn keys_lru_order(&self) -> Vec<CacheKey> {
        self.index.lock().keys_lru_order()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Spawn the periodic expiration sweep
    ///
    /// Returns false when already running or disabled by configuration.
    pub fn start_maintenance(self: &Arc<Self>) -> bool {
        if self.config.maintenance_interval_secs == 0 || self.shutdown.is_cancelled() {
            return false;
        }

        let mut slot = self.maintenance.lock();
        if slot.is_some() {
            return false;
        }

        let period = Duration::from_secs(self.config.maintenance_interval_secs);
        let store: Weak<Self> = Arc::downgrade(self);
        let token = self.shutdown.clone();

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        store.evict_expired();
                    }
                }
            }
            debug!("Cache maintenance stopped");
        }));

        info!(interval_secs = self.config.maintenance_interval_secs, "Cache maintenance started");
        true
    }

    /// Whether the background sweep is running
    pub fn maintenance_running(&self) -> bool {
        self.maintenance
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop maintenance and close the distributed backend
    ///
    /// The memory tier stays usable afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.maintenance.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cache maintenance task ended abnormally");
            }
        }

        if let Err(e) = self.backend.close().await {
            warn!(backend = self.backend.name(), error = %e, "Failed to close distributed backend");
        }
        info!("Cache store shut down");
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn emit(&self, event: AccessEvent) {
        self.access_log.record(event.clone());
        let _ = self.event_tx.send(event);
    }

    /// Account for the entry an insert pushed out, if any
    fn record_displaced(&self, outcome: InsertOutcome, now: DateTime<Utc>) {
        if let Some(expired) = outcome.expired {
            self.metrics.record_expirations(1);
            debug!(key = %expired.key, "Expired entry made room for insert");
            self.emit(
                AccessEvent::at(AccessEventKind::Expiration, expired.key, now)
                    .with_content_type(expired.content_type),
            );
        }
        if let Some(evicted) = outcome.evicted {
            self.record_eviction(evicted, now);
        }
    }

    fn record_eviction(&self, evicted: CacheEntry, now: DateTime<Utc>) {
        self.metrics.record_eviction();
        debug!(key = %evicted.key, "Evicted least recently used entry");
        self.emit(
            AccessEvent::at(AccessEventKind::Eviction, evicted.key, now)
                .with_content_type(evicted.content_type),
        );
    }

    fn check_capacity(&self, size: usize) {
        if size > self.config.max_size {
            error!(
                size,
                max_size = self.config.max_size,
                "Cache size exceeds configured maximum"
            );
            debug_assert!(size <= self.config.max_size, "capacity invariant violated");
        }
    }

    /// Install a value served by the distributed tier, unless a fresher local
    /// entry appeared meanwhile
    fn promote(&self, key: &CacheKey, value: Bytes, content_type: Option<String>) {
        let now = Utc::now();
        let entry = CacheEntry::new(*key, value, self.config.default_ttl_secs, now)
            .with_content_type(content_type);

        let (outcome, size) = {
            let mut index = self.index.lock();
            if index.contains(key) {
                return;
            }
            let outcome = index.insert(entry);
            (outcome, index.len())
        };
        self.check_capacity(size);

        self.record_displaced(outcome, now);
        debug!(key = %key, "Promoted value from distributed tier");
    }

    async fn distributed_get(&self, key: &CacheKey) -> Option<Bytes> {
        let result = tokio::time::timeout(self.distributed_timeout, self.backend.get(key)).await;
        match result {
            Ok(Ok(Some(value))) => {
                self.metrics.record_distributed_hit();
                Some(value)
            }
            Ok(Ok(None)) => {
                self.metrics.record_distributed_miss();
                None
            }
            Ok(Err(e)) => {
                self.metrics.record_distributed_miss();
                self.absorb_distributed_failure(&e);
                None
            }
            Err(_) => {
                self.metrics.record_distributed_miss();
                self.absorb_distributed_failure(&self.timeout_error("get"));
                None
            }
        }
    }

    async fn distributed_set(&self, key: &CacheKey, value: Bytes, ttl_secs: u64) {
        let write = self.backend.set_with_ttl(key, value, ttl_secs);
        match tokio::time::timeout(self.distributed_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.absorb_distributed_failure(&e),
            Err(_) => self.absorb_distributed_failure(&self.timeout_error("set")),
        }
    }

    fn timeout_error(&self, operation: &str) -> Error {
        Error::DistributedTimeout {
            backend: self.backend.name().to_string(),
            operation: operation.to_string(),
            timeout_ms: self.distributed_timeout.as_millis() as u64,
        }
    }

    fn absorb_distributed_failure(&self, err: &Error) {
        self.metrics.record_distributed_error();
        warn!(
            backend = self.backend.name(),
            error = %err,
            transient = err.is_transient(),
            "Distributed tier call failed, continuing memory-only"
        );
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .field("len", &self.len())
            .field("max_size", &self.config.max_size)
            .finish()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
