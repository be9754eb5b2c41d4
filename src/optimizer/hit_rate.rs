//! Hit-Rate Analysis
//!
//! Windowed hit rate with a first-half versus second-half trend.

use crate::cache::events::{AccessEvent, AccessEventKind};
use serde::{Deserialize, Serialize};

/// Minimum change between halves that counts as a trend
pub const TREND_THRESHOLD: f64 = 0.05;

/// Below this hit rate capacity or TTL should grow
pub const LOW_HIT_RATE: f64 = 0.6;

/// Above this hit rate no action is needed
pub const GOOD_HIT_RATE: f64 = 0.8;

// Absorbs float noise when a difference lands exactly on the threshold
const TREND_EPSILON: f64 = 1e-9;

/// Direction of the hit rate across the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRateTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for HitRateTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HitRateTrend::Increasing => write!(f, "increasing"),
            HitRateTrend::Decreasing => write!(f, "decreasing"),
            HitRateTrend::Stable => write!(f, "stable"),
        }
    }
}

/// Hit rate over an analysis window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRateAnalysis {
    pub window_hours: f64,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub first_half_hit_rate: f64,
    pub second_half_hit_rate: f64,
    pub trend: HitRateTrend,
    pub recommendation: String,
}

impl HitRateAnalysis {
    /// Whether the window held enough requests to say anything
    pub fn has_data(&self) -> bool {
        self.total_requests > 0
    }
}

/// Analyze hit and miss events, already restricted to the window and
/// ordered by timestamp
pub fn analyze_hit_rate(events: &[AccessEvent], window_hours: f64) -> HitRateAnalysis {
    let requests: Vec<&AccessEvent> = events.iter().filter(|e| e.kind.is_request()).collect();
    let (hits, misses) = count(&requests);
    let total_requests = hits + misses;
    let hit_rate = rate(hits, total_requests);

    let (first_half_hit_rate, second_half_hit_rate, trend) = if requests.len() < 2 {
        (hit_rate, hit_rate, HitRateTrend::Stable)
    } else {
        let (first, second) = requests.split_at(requests.len() / 2);
        let first_rate = rate_of(first);
        let second_rate = rate_of(second);
        (first_rate, second_rate, classify(first_rate, second_rate))
    };

    HitRateAnalysis {
        window_hours,
        total_requests,
        hits,
        misses,
        hit_rate,
        first_half_hit_rate,
        second_half_hit_rate,
        trend,
        recommendation: recommendation(total_requests, hit_rate),
    }
}

fn classify(first: f64, second: f64) -> HitRateTrend {
    let delta = second - first;
    if delta >= TREND_THRESHOLD - TREND_EPSILON {
        HitRateTrend::Increasing
    } else if delta <= -(TREND_THRESHOLD - TREND_EPSILON) {
        HitRateTrend::Decreasing
    } else {
        HitRateTrend::Stable
    }
}

fn recommendation(total_requests: u64, hit_rate: f64) -> String {
    if total_requests == 0 {
        "No cache requests in the analysis window".to_string()
    } else if hit_rate < LOW_HIT_RATE {
        format!(
            "Hit rate {:.1}% is low: increase cache capacity or entry TTL",
            hit_rate * 100.0
        )
    } else if hit_rate <= GOOD_HIT_RATE {
        format!(
            "Hit rate {:.1}% is moderate: TTL and capacity tuning can still help",
            hit_rate * 100.0
        )
    } else {
        format!("Hit rate {:.1}% is good: no action needed", hit_rate * 100.0)
    }
}

fn count(requests: &[&AccessEvent]) -> (u64, u64) {
    let hits = requests
        .iter()
        .filter(|e| e.kind == AccessEventKind::Hit)
        .count() as u64;
    (hits, requests.len() as u64 - hits)
}

fn rate_of(requests: &[&AccessEvent]) -> f64 {
    let (hits, misses) = count(requests);
    rate(hits, hits + misses)
}

fn rate(hits: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
