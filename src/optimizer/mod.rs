//! Cache Optimizer
//!
//! Read-only analysis over the access log and store snapshots. Nothing here
//! changes cache configuration: recommendations are returned to the caller,
//! who decides whether to apply them.
//!
//! The synthetic benchmark runs against a scratch store sized like the live
//! one, so the live entries, counters and access log are never disturbed.

pub mod benchmark;
pub mod hit_rate;
pub mod patterns;
pub mod report;
pub mod stats;
pub mod ttl;

pub use benchmark::BenchmarkResult;
pub use hit_rate::{HitRateAnalysis, HitRateTrend};
pub use patterns::{AccessPatternAnalysis, HourlyActivity, KeyFrequency};
pub use report::{OptimizationReport, Recommendation, RecommendationCategory};
pub use ttl::{OptimizationRecommendation, TtlPolicy};

use crate::cache::store::CacheStore;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for the analyses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// A key is hot when its access count exceeds this multiple of the mean
    pub hot_key_multiple: f64,
    /// Fewer re-access gaps than this yields no TTL recommendation
    pub min_gap_samples: usize,
    /// Gap count at which TTL confidence reaches the cap
    pub confidence_target_samples: usize,
    /// Upper bound on TTL confidence
    pub confidence_cap: f64,
    /// Requests issued by the report's benchmark (0 = skip)
    pub benchmark_requests: usize,
    /// Share of benchmark requests drawn from the hot key pool
    pub benchmark_repeated_fraction: f64,
    /// Size of each benchmark value
    pub benchmark_value_bytes: usize,
    /// Seed for the benchmark request mix
    pub benchmark_seed: u64,
    /// Benchmark p99 latency above which a recommendation is raised
    pub p99_latency_budget_ms: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            hot_key_multiple: 2.0,
            min_gap_samples: 5,
            confidence_target_samples: 100,
            confidence_cap: 0.95,
            benchmark_requests: 1000,
            benchmark_repeated_fraction: 0.7,
            benchmark_value_bytes: 256,
            benchmark_seed: 42,
            p99_latency_budget_ms: 10.0,
        }
    }
}

impl OptimizerConfig {
    /// Reject configurations the analyses cannot honor
    pub fn validate(&self) -> Result<()> {
        if !(self.hot_key_multiple.is_finite() && self.hot_key_multiple > 0.0) {
            return Err(Error::Configuration(format!(
                "optimizer.hot_key_multiple must be positive, got {}",
                self.hot_key_multiple
            )));
        }
        if !(0.0..1.0).contains(&self.confidence_cap) {
            return Err(Error::Configuration(format!(
                "optimizer.confidence_cap must be within [0, 1), got {}",
                self.confidence_cap
            )));
        }
        if !(0.0..=1.0).contains(&self.benchmark_repeated_fraction) {
            return Err(Error::Configuration(format!(
                "optimizer.benchmark_repeated_fraction must be within [0, 1], got {}",
                self.benchmark_repeated_fraction
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Optimizer
// =============================================================================

/// Analysis engine over a cache store and its access log
pub struct CacheOptimizer {
    store: Arc<CacheStore>,
    config: OptimizerConfig,
}

impl CacheOptimizer {
    /// Create an optimizer for `store`
    pub fn new(store: Arc<CacheStore>, config: OptimizerConfig) -> Self {
        Self { store, config }
    }

    /// Optimizer configuration
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Hit rate and trend over the last `window_hours`
    pub fn analyze_hit_rate(&self, window_hours: f64) -> Result<HitRateAnalysis> {
        let window = window_duration(window_hours)?;
        let events = self.store.access_log().recent(window);
        Ok(hit_rate::analyze_hit_rate(&events, window_hours))
    }

    /// TTL recommendation for `target_hit_rate` from the retained log
    pub fn optimize_ttl(&self, target_hit_rate: f64) -> Result<OptimizationRecommendation> {
        validate_target(target_hit_rate)?;
        let events = self.store.access_log().snapshot();
        let recommendation = ttl::optimize_ttl(&events, target_hit_rate, &self.ttl_policy());

        debug!(
            recommended_ttl_secs = recommendation.recommended_ttl_secs,
            confidence = recommendation.confidence_score,
            samples = recommendation.sample_size,
            "TTL analysis complete"
        );
        Ok(recommendation)
    }

    /// Synthetic load against a scratch copy of the store
    pub async fn benchmark_performance(
        &self,
        num_requests: usize,
        cancel: &CancellationToken,
    ) -> Result<BenchmarkResult> {
        benchmark::benchmark_performance(&self.store, num_requests, &self.config, cancel).await
    }

    /// Hot/cold split, peak hours and content types over the retained log
    pub fn analyze_access_patterns(&self) -> AccessPatternAnalysis {
        let events = self.store.access_log().snapshot();
        patterns::analyze_access_patterns(&events, self.config.hot_key_multiple)
    }

    /// Run every analysis and merge the findings
    ///
    /// On cancellation the sections gathered so far are returned with
    /// `cancelled` set.
    pub async fn generate_optimization_report(
        &self,
        window_hours: f64,
        target_hit_rate: f64,
        cancel: &CancellationToken,
    ) -> Result<OptimizationReport> {
        validate_target(target_hit_rate)?;
        window_duration(window_hours)?;

        // Snapshot first so every section describes the same moment
        let metrics = self.store.metrics_snapshot();
        let mut report = OptimizationReport {
            generated_at: Utc::now(),
            window_hours,
            target_hit_rate,
            hit_rate: None,
            ttl: None,
            access_patterns: None,
            benchmark: None,
            metrics,
            recommendations: Vec::new(),
            cancelled: false,
        };

        'stages: {
            if cancel.is_cancelled() {
                break 'stages;
            }
            report.hit_rate = Some(self.analyze_hit_rate(window_hours)?);

            if cancel.is_cancelled() {
                break 'stages;
            }
            report.ttl = Some(self.optimize_ttl(target_hit_rate)?);

            if cancel.is_cancelled() {
                break 'stages;
            }
            report.access_patterns = Some(self.analyze_access_patterns());

            if self.config.benchmark_requests > 0 {
                if cancel.is_cancelled() {
                    break 'stages;
                }
                let result = self
                    .benchmark_performance(self.config.benchmark_requests, cancel)
                    .await?;
                report.benchmark = Some(result);
            }
        }
        report.cancelled = cancel.is_cancelled()
            || report.benchmark.as_ref().map(|b| b.cancelled).unwrap_or(false);

        report.recommendations = report::build_recommendations(&report::ReportInputs {
            target_hit_rate,
            p99_budget_ms: self.config.p99_latency_budget_ms,
            hit_rate: report.hit_rate.as_ref(),
            ttl: report.ttl.as_ref(),
            access_patterns: report.access_patterns.as_ref(),
            benchmark: report.benchmark.as_ref(),
            metrics: &report.metrics,
        });

        info!(
            recommendations = report.recommendations.len(),
            cancelled = report.cancelled,
            "Optimization report generated"
        );
        Ok(report)
    }

    fn ttl_policy(&self) -> TtlPolicy {
        let cache = self.store.config();
        TtlPolicy {
            current_ttl_secs: cache.default_ttl_secs,
            max_ttl_secs: cache.max_ttl_secs,
            min_gap_samples: self.config.min_gap_samples,
            confidence_target_samples: self.config.confidence_target_samples,
            confidence_cap: self.config.confidence_cap,
        }
    }
}

fn window_duration(window_hours: f64) -> Result<Duration> {
    if window_hours <= 0.0 {
        return Err(Error::Validation(format!(
            "analysis window must be positive, got {} hours",
            window_hours
        )));
    }
    Duration::try_from_secs_f64(window_hours * 3600.0).map_err(|_| {
        Error::Validation(format!("analysis window of {} hours is out of range", window_hours))
    })
}

fn validate_target(target_hit_rate: f64) -> Result<()> {
    if (0.0..=1.0).contains(&target_hit_rate) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "target hit rate must be within [0, 1], got {}",
            target_hit_rate
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheConfig;
    use assert_matches::assert_matches;

    fn optimizer(config: OptimizerConfig) -> CacheOptimizer {
        let store = CacheStore::memory_only(CacheConfig {
            maintenance_interval_secs: 0,
            ..Default::default()
        })
        .unwrap();
        CacheOptimizer::new(store, config)
    }

    #[tokio::test]
    async fn test_hit_rate_over_live_store() {
        let optimizer = optimizer(OptimizerConfig::default());
        let store = Arc::clone(&optimizer.store);

        store.set("a", "1").await.unwrap();
        for _ in 0..3 {
            store.get("a").await;
        }
        store.get("b").await;

        let analysis = optimizer.analyze_hit_rate(1.0).unwrap();
        assert_eq!(analysis.hits, 3);
        assert_eq!(analysis.misses, 1);
        assert_eq!(analysis.hit_rate, 0.75);
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let optimizer = optimizer(OptimizerConfig::default());
        assert_matches!(optimizer.analyze_hit_rate(0.0), Err(Error::Validation(_)));
        assert_matches!(optimizer.analyze_hit_rate(f64::NAN), Err(Error::Validation(_)));
        assert_matches!(optimizer.optimize_ttl(1.5), Err(Error::Validation(_)));
    }

    #[test]
    fn test_ttl_without_data_keeps_default() {
        let optimizer = optimizer(OptimizerConfig::default());
        let rec = optimizer.optimize_ttl(0.9).unwrap();
        assert_eq!(rec.recommended_ttl_secs, 3600);
        assert_eq!(rec.confidence_score, 0.0);
    }

    #[tokio::test]
    async fn test_report_with_benchmark() {
        let optimizer = optimizer(OptimizerConfig {
            benchmark_requests: 200,
            ..Default::default()
        });

        let report = optimizer
            .generate_optimization_report(1.0, 0.9, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.cancelled);
        assert!(report.hit_rate.is_some());
        assert!(report.ttl.is_some());
        assert!(report.access_patterns.is_some());
        assert_eq!(report.benchmark.as_ref().map(|b| b.completed), Some(200));
        assert_eq!(report.metrics.total_requests, 0);
        assert_eq!(optimizer.store.metrics_snapshot().total_requests, 0);
        assert!(optimizer.store.access_log().is_empty());
        let impacts: Vec<f64> = report
            .recommendations
            .iter()
            .map(|r| r.expected_impact_pct)
            .collect();
        assert!(impacts.windows(2).all(|w| w[0] >= w[1]));
        assert!(report.into_complete().is_ok());
    }

    #[tokio::test]
    async fn test_report_skips_benchmark_when_disabled() {
        let optimizer = optimizer(OptimizerConfig {
            benchmark_requests: 0,
            ..Default::default()
        });

        let report = optimizer
            .generate_optimization_report(24.0, 0.8, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.benchmark.is_none());
        assert!(optimizer.store.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_report_is_partial() {
        let optimizer = optimizer(OptimizerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = optimizer
            .generate_optimization_report(1.0, 0.9, &cancel)
            .await
            .unwrap();
        assert!(report.cancelled);
        assert!(report.hit_rate.is_none());
        assert!(report.benchmark.is_none());
        assert_matches!(report.into_complete(), Err(Error::Cancelled(_)));
    }

    #[test]
    fn test_config_validation() {
        assert!(OptimizerConfig::default().validate().is_ok());
        assert!(OptimizerConfig {
            confidence_cap: 1.0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(OptimizerConfig {
            hot_key_multiple: 0.0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
