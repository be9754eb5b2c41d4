//! Cache Metrics
//!
//! Cache-line aligned counters updated on the hot path, a collector that
//! derives rates and health from them, and a Prometheus exporter.

use prometheus::{Gauge, IntGauge, Registry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

// =============================================================================
// Cache Line Size
// =============================================================================

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

/// Default hit rate below which the cache is reported as degraded
pub const DEFAULT_HEALTHY_HIT_RATE_FLOOR: f64 = 0.6;

// =============================================================================
// Counters (Cache-Line Aligned)
// =============================================================================

/// Cumulative cache counters, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug)]
pub struct CacheMetrics {
    /// Lookups served by the memory tier
    pub hits: AtomicU64,
    /// Lookups not served by the memory tier
    pub misses: AtomicU64,
    /// Entries evicted for capacity
    pub evictions: AtomicU64,
    /// Entries removed because their TTL elapsed
    pub expirations: AtomicU64,
    /// Values stored
    pub sets: AtomicU64,
    /// Memory misses served by the distributed tier
    pub distributed_hits: AtomicU64,
    /// Memory misses the distributed tier could not serve
    pub distributed_misses: AtomicU64,
    /// Distributed tier failures and timeouts (absorbed)
    pub distributed_errors: AtomicU64,
}

// Verify size at compile time
const _: () = assert!(std::mem::size_of::<CacheMetrics>() <= CACHE_LINE_SIZE);

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            distributed_hits: AtomicU64::new(0),
            distributed_misses: AtomicU64::new(0),
            distributed_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_distributed_hit(&self) {
        self.distributed_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_distributed_miss(&self) {
        self.distributed_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_distributed_error(&self) {
        self.distributed_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset every counter to zero
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.expirations,
            &self.sets,
            &self.distributed_hits,
            &self.distributed_misses,
            &self.distributed_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters
    pub fn counters(&self) -> MetricsCounters {
        MetricsCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            distributed_hits: self.distributed_hits.load(Ordering::Relaxed),
            distributed_misses: self.distributed_misses.load(Ordering::Relaxed),
            distributed_errors: self.distributed_errors.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Counter Snapshot
// =============================================================================

/// Plain copy of the cumulative counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub sets: u64,
    pub distributed_hits: u64,
    pub distributed_misses: u64,
    pub distributed_errors: u64,
}

impl MetricsCounters {
    /// Total lookups (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// hits / total_requests, 0 when there were no requests
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.total_requests())
    }

    /// distributed_hits / distributed lookups, 0 when there were none
    pub fn distributed_hit_rate(&self) -> f64 {
        ratio(
            self.distributed_hits,
            self.distributed_hits + self.distributed_misses,
        )
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Coarse health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHealth {
    /// No lookups yet
    Idle,
    /// Hit rate above the configured floor
    Healthy,
    /// Hit rate at or below the configured floor
    Degraded,
}

impl std::fmt::Display for CacheHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheHealth::Idle => write!(f, "idle"),
            CacheHealth::Healthy => write!(f, "healthy"),
            CacheHealth::Degraded => write!(f, "degraded"),
        }
    }
}

/// Counters plus derived rates, utilization, and health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
    pub counters: MetricsCounters,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub distributed_hit_rate: f64,
    pub cache_size: usize,
    pub max_size: usize,
    pub utilization: f64,
    pub health: CacheHealth,
}

impl CacheMetricsSnapshot {
    /// Flat export view
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            hits: self.counters.hits,
            misses: self.counters.misses,
            evictions: self.counters.evictions,
            hit_rate: self.hit_rate,
            cache_size: self.cache_size,
            max_size: self.max_size,
            distributed_hit_rate: self.distributed_hit_rate,
            utilization: self.utilization,
        }
    }
}

/// Read-only view deriving rates and health from raw counters
#[derive(Debug, Clone)]
pub struct CacheMetricsCollector {
    healthy_hit_rate_floor: f64,
}

impl CacheMetricsCollector {
    /// Create a collector with the given health floor
    pub fn new(healthy_hit_rate_floor: f64) -> Self {
        Self {
            healthy_hit_rate_floor: healthy_hit_rate_floor.clamp(0.0, 1.0),
        }
    }

    /// Configured health floor
    pub fn healthy_hit_rate_floor(&self) -> f64 {
        self.healthy_hit_rate_floor
    }

    /// Derive a snapshot from counters and the store's current occupancy
    pub fn collect(&self, counters: MetricsCounters, cache_size: usize, max_size: usize) -> CacheMetricsSnapshot {
        let total_requests = counters.total_requests();
        let hit_rate = counters.hit_rate();
        let health = if total_requests == 0 {
            CacheHealth::Idle
        } else if hit_rate > self.healthy_hit_rate_floor {
            CacheHealth::Healthy
        } else {
            CacheHealth::Degraded
        };

        CacheMetricsSnapshot {
            counters,
            total_requests,
            hit_rate,
            distributed_hit_rate: counters.distributed_hit_rate(),
            cache_size,
            max_size,
            utilization: if max_size == 0 {
                0.0
            } else {
                cache_size as f64 / max_size as f64
            },
            health,
        }
    }
}

impl Default for CacheMetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTHY_HIT_RATE_FLOOR)
    }
}

// =============================================================================
// Flat Report
// =============================================================================

/// Serialization-ready metrics for monitoring pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub cache_size: usize,
    pub max_size: usize,
    pub distributed_hit_rate: f64,
    pub utilization: f64,
}

impl MetricsReport {
    /// Flatten into a name -> value map
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("hits".to_string(), self.hits as f64);
        map.insert("misses".to_string(), self.misses as f64);
        map.insert("evictions".to_string(), self.evictions as f64);
        map.insert("hit_rate".to_string(), self.hit_rate);
        map.insert("cache_size".to_string(), self.cache_size as f64);
        map.insert("max_size".to_string(), self.max_size as f64);
        map.insert("distributed_hit_rate".to_string(), self.distributed_hit_rate);
        map.insert("utilization".to_string(), self.utilization);
        map
    }
}

// =============================================================================
// Prometheus Exporter
// =============================================================================

/// Publishes `MetricsReport` values as Prometheus gauges
#[derive(Clone)]
pub struct CacheMetricsExporter {
    hits: IntGauge,
    misses: IntGauge,
    evictions: IntGauge,
    hit_rate: Gauge,
    cache_size: IntGauge,
    max_size: IntGauge,
    distributed_hit_rate: Gauge,
    utilization: Gauge,
}

impl CacheMetricsExporter {
    /// Register gauges named `<prefix>_<field>` in `registry`
    pub fn register(registry: &Registry, prefix: &str) -> Result<Self> {
        let int_gauge = |name: &str, help: &str| -> Result<IntGauge> {
            let gauge = IntGauge::new(format!("{}_{}", prefix, name), help)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };
        let gauge = |name: &str, help: &str| -> Result<Gauge> {
            let gauge = Gauge::new(format!("{}_{}", prefix, name), help)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        Ok(Self {
            hits: int_gauge("hits", "Cumulative memory tier hits")?,
            misses: int_gauge("misses", "Cumulative memory tier misses")?,
            evictions: int_gauge("evictions", "Cumulative capacity evictions")?,
            hit_rate: gauge("hit_rate", "Memory tier hit rate")?,
            cache_size: int_gauge("cache_size", "Entries currently cached")?,
            max_size: int_gauge("max_size", "Configured entry capacity")?,
            distributed_hit_rate: gauge("distributed_hit_rate", "Distributed tier hit rate")?,
            utilization: gauge("utilization", "cache_size / max_size")?,
        })
    }

    /// Publish a report
    pub fn update(&self, report: &MetricsReport) {
        self.hits.set(report.hits as i64);
        self.misses.set(report.misses as i64);
        self.evictions.set(report.evictions as i64);
        self.hit_rate.set(report.hit_rate);
        self.cache_size.set(report.cache_size as i64);
        self.max_size.set(report.max_size as i64);
        self.distributed_hit_rate.set(report.distributed_hit_rate);
        self.utilization.set(report.utilization);
    }
}
