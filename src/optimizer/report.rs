//! Optimization Report
//!
//! Folds the individual analyses and a metrics snapshot into one list of
//! recommendations, highest expected impact first.

use crate::cache::metrics::CacheMetricsSnapshot;
use crate::error::{Error, Result};
use crate::optimizer::benchmark::BenchmarkResult;
use crate::optimizer::hit_rate::{HitRateAnalysis, HitRateTrend};
use crate::optimizer::patterns::AccessPatternAnalysis;
use crate::optimizer::ttl::OptimizationRecommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Utilization at which the cache counts as full
pub const FULL_UTILIZATION: f64 = 0.95;

/// Area a recommendation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    HitRate,
    Ttl,
    Capacity,
    AccessPattern,
    DistributedTier,
    Latency,
}

/// One actionable suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    /// Estimated hit-rate gain (or equivalent) in percentage points
    pub expected_impact_pct: f64,
    pub message: String,
}

/// Combined result of every analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub generated_at: DateTime<Utc>,
    pub window_hours: f64,
    pub target_hit_rate: f64,
    pub hit_rate: Option<HitRateAnalysis>,
    pub ttl: Option<OptimizationRecommendation>,
    pub access_patterns: Option<AccessPatternAnalysis>,
    pub benchmark: Option<BenchmarkResult>,
    pub metrics: CacheMetricsSnapshot,
    /// Sorted by expected impact, descending
    pub recommendations: Vec<Recommendation>,
    /// Report was cut short; some sections may be missing
    pub cancelled: bool,
}

impl OptimizationReport {
    /// Highest-impact recommendation, if any
    pub fn top_recommendation(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }

    /// Fail with `Error::Cancelled` if the report is partial
    pub fn into_complete(self) -> Result<Self> {
        if self.cancelled {
            Err(Error::Cancelled("optimization report".to_string()))
        } else {
            Ok(self)
        }
    }
}

/// Inputs for building the recommendation list
pub(crate) struct ReportInputs<'a> {
    pub target_hit_rate: f64,
    pub p99_budget_ms: f64,
    pub hit_rate: Option<&'a HitRateAnalysis>,
    pub ttl: Option<&'a OptimizationRecommendation>,
    pub access_patterns: Option<&'a AccessPatternAnalysis>,
    pub benchmark: Option<&'a BenchmarkResult>,
    pub metrics: &'a CacheMetricsSnapshot,
}

/// Derive recommendations and order them by expected impact
pub(crate) fn build_recommendations(inputs: &ReportInputs<'_>) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if let Some(analysis) = inputs.hit_rate.filter(|a| a.has_data()) {
        if analysis.hit_rate < inputs.target_hit_rate {
            out.push(Recommendation {
                category: RecommendationCategory::HitRate,
                expected_impact_pct: (inputs.target_hit_rate - analysis.hit_rate) * 100.0,
                message: format!(
                    "{} (target {:.1}%)",
                    analysis.recommendation,
                    inputs.target_hit_rate * 100.0
                ),
            });
        }
        if analysis.trend == HitRateTrend::Decreasing {
            out.push(Recommendation {
                category: RecommendationCategory::HitRate,
                expected_impact_pct: (analysis.first_half_hit_rate - analysis.second_half_hit_rate)
                    * 100.0,
                message: format!(
                    "Hit rate is falling ({:.1}% -> {:.1}%): check for workload shifts or premature expiry",
                    analysis.first_half_hit_rate * 100.0,
                    analysis.second_half_hit_rate * 100.0
                ),
            });
        }
    }

    if let Some(ttl) = inputs.ttl.filter(|t| t.is_actionable()) {
        out.push(Recommendation {
            category: RecommendationCategory::Ttl,
            expected_impact_pct: ttl.expected_hit_rate_improvement_pct * ttl.confidence_score,
            message: format!(
                "Change default TTL from {}s to {}s (confidence {:.2}): {}",
                ttl.current_ttl_secs, ttl.recommended_ttl_secs, ttl.confidence_score, ttl.reasoning
            ),
        });
    }

    let counters = &inputs.metrics.counters;
    if inputs.metrics.utilization >= FULL_UTILIZATION && counters.evictions > 0 {
        let requests = inputs.metrics.total_requests.max(1);
        out.push(Recommendation {
            category: RecommendationCategory::Capacity,
            expected_impact_pct: (counters.evictions as f64 / requests as f64 * 100.0).min(100.0),
            message: format!(
                "Cache is {:.0}% full with {} evictions: raise max_size above {}",
                inputs.metrics.utilization * 100.0,
                counters.evictions,
                inputs.metrics.max_size
            ),
        });
    }

    if counters.distributed_errors > 0 {
        let lookups = (counters.distributed_hits + counters.distributed_misses).max(1);
        out.push(Recommendation {
            category: RecommendationCategory::DistributedTier,
            expected_impact_pct: (counters.distributed_errors as f64 / lookups as f64 * 100.0)
                .min(100.0),
            message: format!(
                "{} distributed tier calls failed or timed out: check backend health and timeout",
                counters.distributed_errors
            ),
        });
    }

    if let Some(patterns) = inputs.access_patterns.filter(|p| p.hot_keys_count > 0) {
        let miss_rate = inputs
            .hit_rate
            .filter(|a| a.has_data())
            .map(|a| 1.0 - a.hit_rate)
            .unwrap_or(0.0);
        let impact = patterns.hot_access_share * miss_rate * 100.0;
        if impact > 0.0 {
            out.push(Recommendation {
                category: RecommendationCategory::AccessPattern,
                expected_impact_pct: impact,
                message: format!(
                    "{} hot keys receive {:.1}% of accesses: warm them at startup",
                    patterns.hot_keys_count,
                    patterns.hot_access_share * 100.0
                ),
            });
        }
    }

    if let Some(bench) = inputs.benchmark.filter(|b| b.completed > 0) {
        if bench.p99_latency_ms > inputs.p99_budget_ms {
            out.push(Recommendation {
                category: RecommendationCategory::Latency,
                expected_impact_pct: 0.0,
                message: format!(
                    "Benchmark p99 latency {:.2}ms exceeds {:.2}ms budget: check lock contention and distributed timeout",
                    bench.p99_latency_ms, inputs.p99_budget_ms
                ),
            });
        }
    }

    out.sort_by(|a, b| b.expected_impact_pct.total_cmp(&a.expected_impact_pct));
    out
}
