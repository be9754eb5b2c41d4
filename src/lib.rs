//! Semantic Cache
//!
//! A two-tier cache for expensive content analysis results, with a
//! data-driven optimizer that tunes it from its own access log.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Callers                                    │
//! │            (analysis services, event consumers, API handlers)           │
//! └───────────────┬──────────────────────────────────────▲──────────────────┘
//!                 │ get / set / warm                     │ recommendations
//! ┌───────────────▼──────────────────────┐   ┌───────────┴──────────────────┐
//! │             CacheStore               │   │        CacheOptimizer        │
//! │  ┌────────────┐   ┌───────────────┐  │   │  hit rate + trend            │
//! │  │ LRU + TTL  │──►│ Distributed   │  │   │  TTL from re-access gaps     │
//! │  │ (memory)   │◄──│ tier (opt.)   │  │   │  hot/cold + peak hours       │
//! │  └────────────┘   └───────────────┘  │   │  synthetic benchmark         │
//! │  ┌────────────┐   ┌───────────────┐  │   └───────────▲──────────────────┘
//! │  │ Metrics    │   │ AccessEventLog│──┼───────────────┘ read-only
//! │  └────────────┘   └───────────────┘  │
//! └──────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Cache store, distributed backends, metrics and access log
//! - [`optimizer`]: Access-log analyses and the optimization report
//! - [`config`]: YAML and environment configuration
//! - [`telemetry`]: Logging setup
//! - [`error`]: Error types and handling

pub mod cache;
pub mod config;
pub mod error;
pub mod optimizer;
pub mod telemetry;

// Re-export commonly used types
pub use cache::{
    AccessEvent, AccessEventKind, AccessEventLog, BackendFactory, BackendKind, CacheConfig,
    CacheEntry, CacheHealth, CacheKey, CacheLookup, CacheMetricsExporter, CacheMetricsSnapshot,
    CacheStore, DistributedBackend, DistributedBackendRef, DistributedConfig, HttpBackend,
    InMemoryBackend, LookupSource, MetricsReport, NoopBackend, SetOptions, WarmConfig,
    WarmSummary,
};

pub use config::{LoggingConfig, SemanticCacheConfig};

pub use error::{Error, Result};

pub use optimizer::{
    AccessPatternAnalysis, BenchmarkResult, CacheOptimizer, HitRateAnalysis, HitRateTrend,
    OptimizationRecommendation, OptimizationReport, OptimizerConfig, Recommendation,
    RecommendationCategory,
};

pub use telemetry::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
