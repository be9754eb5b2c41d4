//! TTL Optimization
//!
//! Pools the gaps between consecutive lookups of the same key and picks a
//! TTL that would have kept those re-accesses in cache.
//!
//! | target hit rate | recommended TTL        |
//! |-----------------|------------------------|
//! | >= 0.9          | 95th percentile of gaps|
//! | >= 0.8          | 90th percentile of gaps|
//! | otherwise       | 1.5 x median gap       |
//!
//! Confidence is `min(cap, gaps / target_samples)`. With fewer than the
//! minimum number of gaps the current TTL is returned with zero confidence.

use crate::cache::entry::CacheKey;
use crate::cache::events::AccessEvent;
use crate::optimizer::stats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inputs that shape a TTL recommendation
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    /// TTL currently applied by the store
    pub current_ttl_secs: u64,
    /// Largest TTL the store accepts
    pub max_ttl_secs: u64,
    /// Fewer gaps than this yields no recommendation
    pub min_gap_samples: usize,
    /// Gap count at which confidence reaches the cap
    pub confidence_target_samples: usize,
    /// Upper bound on confidence
    pub confidence_cap: f64,
}

/// Recommended TTL with its expected effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub current_ttl_secs: u64,
    pub recommended_ttl_secs: u64,
    /// Gap statistic the recommendation was derived from, in seconds
    pub observed_gap_secs: f64,
    pub target_hit_rate: f64,
    pub expected_hit_rate_improvement_pct: f64,
    pub confidence_score: f64,
    /// Number of pooled gap observations
    pub sample_size: usize,
    pub reasoning: String,
}

impl OptimizationRecommendation {
    /// Whether there was enough data to recommend anything
    pub fn is_actionable(&self) -> bool {
        self.confidence_score > 0.0 && self.recommended_ttl_secs != self.current_ttl_secs
    }

    /// Signed change from the current TTL in seconds
    pub fn ttl_change_secs(&self) -> i64 {
        self.recommended_ttl_secs as i64 - self.current_ttl_secs as i64
    }
}

/// Gaps in seconds between consecutive lookups of each key, pooled
pub fn pooled_gaps(events: &[AccessEvent]) -> Vec<f64> {
    let mut by_key: HashMap<CacheKey, Vec<DateTime<Utc>>> = HashMap::new();
    for event in events.iter().filter(|e| e.kind.is_request()) {
        by_key.entry(event.key).or_default().push(event.timestamp);
    }

    let mut gaps = Vec::new();
    for timestamps in by_key.values_mut() {
        if timestamps.len() < 2 {
            continue;
        }
        timestamps.sort();
        gaps.extend(timestamps.windows(2).map(|pair| {
            pair[1].signed_duration_since(pair[0]).num_milliseconds() as f64 / 1000.0
        }));
    }
    stats::sorted(gaps)
}

/// Recommend a TTL for `target_hit_rate` from the logged lookups
pub fn optimize_ttl(
    events: &[AccessEvent],
    target_hit_rate: f64,
    policy: &TtlPolicy,
) -> OptimizationRecommendation {
    let gaps = pooled_gaps(events);
    let sample_size = gaps.len();

    if sample_size < policy.min_gap_samples.max(1) {
        return OptimizationRecommendation {
            current_ttl_secs: policy.current_ttl_secs,
            recommended_ttl_secs: policy.current_ttl_secs,
            observed_gap_secs: 0.0,
            target_hit_rate,
            expected_hit_rate_improvement_pct: 0.0,
            confidence_score: 0.0,
            sample_size,
            reasoning: format!(
                "Insufficient data: {} re-access observations, at least {} needed; keeping current TTL of {}s",
                sample_size, policy.min_gap_samples, policy.current_ttl_secs
            ),
        };
    }

    let (basis, observed) = if target_hit_rate >= 0.9 {
        ("95th percentile", stats::percentile(&gaps, 95.0))
    } else if target_hit_rate >= 0.8 {
        ("90th percentile", stats::percentile(&gaps, 90.0))
    } else {
        ("1.5x median", stats::median(&gaps).map(|m| m * 1.5))
    };
    let observed_gap_secs = observed.unwrap_or(0.0);

    let uncapped = (observed_gap_secs.ceil() as u64).max(1);
    let recommended_ttl_secs = uncapped.min(policy.max_ttl_secs.max(1));

    let improvement = (stats::share_at_or_below(&gaps, recommended_ttl_secs as f64)
        - stats::share_at_or_below(&gaps, policy.current_ttl_secs as f64))
        * 100.0;
    let expected_hit_rate_improvement_pct = improvement.max(0.0);

    let confidence_score = confidence(sample_size, policy);

    let mut reasoning = format!(
        "{} of {} re-access gaps is {:.1}s for target hit rate {:.2}; \
         TTL {}s covers {:.1}% of re-accesses versus {:.1}% at the current {}s",
        basis,
        sample_size,
        observed_gap_secs,
        target_hit_rate,
        recommended_ttl_secs,
        stats::share_at_or_below(&gaps, recommended_ttl_secs as f64) * 100.0,
        stats::share_at_or_below(&gaps, policy.current_ttl_secs as f64) * 100.0,
        policy.current_ttl_secs,
    );
    if recommended_ttl_secs < uncapped {
        reasoning.push_str(&format!(" (capped at maximum TTL {}s)", policy.max_ttl_secs));
    }

    OptimizationRecommendation {
        current_ttl_secs: policy.current_ttl_secs,
        recommended_ttl_secs,
        observed_gap_secs,
        target_hit_rate,
        expected_hit_rate_improvement_pct,
        confidence_score,
        sample_size,
        reasoning,
    }
}

fn confidence(sample_size: usize, policy: &TtlPolicy) -> f64 {
    let cap = policy.confidence_cap.clamp(0.0, 1.0);
    if policy.confidence_target_samples == 0 {
        return cap;
    }
    (sample_size as f64 / policy.confidence_target_samples as f64).min(cap)
}
