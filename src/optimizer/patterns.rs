//! Access-Pattern Analysis
//!
//! Hot/cold key classification against the mean per-key frequency, hour of
//! day peaks, and the content type mix.

use crate::cache::entry::CacheKey;
use crate::cache::events::AccessEvent;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Number of peak hours reported
pub const PEAK_HOURS: usize = 3;

/// Number of hottest keys listed
pub const TOP_KEYS: usize = 10;

/// Label for events without a content type
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

/// Events recorded in one UTC hour of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyActivity {
    /// Hour of day, 0-23 UTC
    pub hour: u32,
    pub events: usize,
}

/// Accesses recorded for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFrequency {
    pub key: CacheKey,
    pub accesses: usize,
}

/// Breakdown of how the cache is being used
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPatternAnalysis {
    /// Caller operations analyzed (hits, misses, sets)
    pub total_accesses: usize,
    pub unique_keys: usize,
    pub mean_accesses_per_key: f64,
    /// Keys with more accesses than this are hot
    pub hot_key_threshold: f64,
    pub hot_keys_count: usize,
    pub cold_keys_count: usize,
    /// Share of accesses that went to hot keys
    pub hot_access_share: f64,
    /// Busiest hours, descending by event count
    pub peak_access_hours: Vec<HourlyActivity>,
    pub content_type_distribution: BTreeMap<String, usize>,
    /// Most accessed keys, descending
    pub top_keys: Vec<KeyFrequency>,
}

/// Classify keys and bucket activity from logged events
pub fn analyze_access_patterns(events: &[AccessEvent], hot_key_multiple: f64) -> AccessPatternAnalysis {
    let mut per_key: HashMap<CacheKey, usize> = HashMap::new();
    let mut per_hour = [0usize; 24];
    let mut content_type_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_accesses = 0usize;

    for event in events.iter().filter(|e| e.kind.is_caller_operation()) {
        total_accesses += 1;
        *per_key.entry(event.key).or_default() += 1;
        per_hour[event.timestamp.hour() as usize] += 1;
        let content_type = event.content_type.as_deref().unwrap_or(UNKNOWN_CONTENT_TYPE);
        *content_type_distribution.entry(content_type.to_string()).or_default() += 1;
    }

    let unique_keys = per_key.len();
    let mean_accesses_per_key = if unique_keys == 0 {
        0.0
    } else {
        total_accesses as f64 / unique_keys as f64
    };
    let hot_key_threshold = mean_accesses_per_key * hot_key_multiple;

    let mut hot_keys_count = 0;
    let mut hot_accesses = 0;
    for accesses in per_key.values() {
        if *accesses as f64 > hot_key_threshold {
            hot_keys_count += 1;
            hot_accesses += accesses;
        }
    }

    let mut peak_access_hours: Vec<HourlyActivity> = per_hour
        .iter()
        .enumerate()
        .filter(|(_, events)| **events > 0)
        .map(|(hour, events)| HourlyActivity {
            hour: hour as u32,
            events: *events,
        })
        .collect();
    peak_access_hours.sort_by(|a, b| b.events.cmp(&a.events).then(a.hour.cmp(&b.hour)));
    peak_access_hours.truncate(PEAK_HOURS);

    let mut top_keys: Vec<KeyFrequency> = per_key
        .into_iter()
        .map(|(key, accesses)| KeyFrequency { key, accesses })
        .collect();
    top_keys.sort_by(|a, b| b.accesses.cmp(&a.accesses).then(a.key.cmp(&b.key)));
    top_keys.truncate(TOP_KEYS);

    AccessPatternAnalysis {
        total_accesses,
        unique_keys,
        mean_accesses_per_key,
        hot_key_threshold,
        hot_keys_count,
        cold_keys_count: unique_keys - hot_keys_count,
        hot_access_share: if total_accesses == 0 {
            0.0
        } else {
            hot_accesses as f64 / total_accesses as f64
        },
        peak_access_hours,
        content_type_distribution,
        top_keys,
    }
}
