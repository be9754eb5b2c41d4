//! End-to-end behavior of the store and the optimizer through the public API

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use semantic_cache::cache::{AccessEvent, AccessEventKind, CacheLookup, LookupSource};
use semantic_cache::{
    BackendKind, CacheConfig, CacheKey, CacheOptimizer, CacheStore, DistributedBackend, Error,
    HitRateTrend, OptimizerConfig, Result, SemanticCacheConfig, SetOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(max_size: usize) -> CacheConfig {
    CacheConfig {
        max_size,
        maintenance_interval_secs: 0,
        ..Default::default()
    }
}

/// Backend that refuses every call and counts attempts
#[derive(Default)]
struct UnreachableBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl DistributedBackend for UnreachableBackend {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::distributed("unreachable", "get", "connection refused"))
    }

    async fn set_with_ttl(&self, _key: &CacheKey, _value: Bytes, _ttl_secs: u64) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::distributed("unreachable", "set", "connection refused"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn size_never_exceeds_capacity() {
    let store = CacheStore::memory_only(config(25)).unwrap();

    for i in 0..200 {
        store.set(format!("doc-{}", i), format!("value-{}", i)).await.unwrap();
        assert!(store.len() <= 25);
    }

    let snapshot = store.metrics_snapshot();
    assert_eq!(snapshot.cache_size, 25);
    assert_eq!(snapshot.counters.evictions, 175);
    assert_eq!(snapshot.utilization, 1.0);
}

#[tokio::test]
async fn set_then_get_round_trips_and_overwrite_is_idempotent() {
    let store = CacheStore::memory_only(config(10)).unwrap();

    store.set("summarize: quarterly report", "summary v1").await.unwrap();
    let lookup = store.get("summarize: quarterly report").await;
    assert_matches!(lookup, CacheLookup::Hit { source: LookupSource::Memory, .. });
    assert_eq!(lookup.into_value(), Some(Bytes::from_static(b"summary v1")));

    store.set("summarize: quarterly report", "summary v2").await.unwrap();
    store.set("summarize: quarterly report", "summary v2").await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get("summarize: quarterly report").await.into_value(),
        Some(Bytes::from_static(b"summary v2"))
    );
    assert_eq!(store.metrics_snapshot().counters.evictions, 0);
}

#[tokio::test]
async fn entries_expire_after_their_ttl() {
    let store = CacheStore::memory_only(config(10)).unwrap();

    store.set_with("short-lived", "v", SetOptions::ttl(1)).await.unwrap();
    store.set("long-lived", "v").await.unwrap();
    assert!(store.get("short-lived").await.is_hit());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(store.get("short-lived").await.is_miss());
    assert!(store.get("long-lived").await.is_hit());

    let counters = store.metrics_snapshot().counters;
    assert_eq!(counters.expirations, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn least_recently_used_entry_is_evicted_first() {
    let store = CacheStore::memory_only(config(2)).unwrap();

    store.set("a", "1").await.unwrap();
    store.set("b", "2").await.unwrap();
    assert!(store.get("a").await.is_hit());
    store.set("c", "3").await.unwrap();

    assert!(store.contains("a"));
    assert!(!store.contains("b"));
    assert!(store.contains("c"));
    assert_eq!(
        store.keys_lru_order(),
        vec![CacheKey::from_content(b"a"), CacheKey::from_content(b"c")]
    );
}

#[tokio::test]
async fn hit_rate_analysis_matches_counted_lookups() {
    let store = CacheStore::memory_only(config(10)).unwrap();
    let optimizer = CacheOptimizer::new(Arc::clone(&store), OptimizerConfig::default());

    store.set("a", "1").await.unwrap();
    for _ in 0..3 {
        assert!(store.get("a").await.is_hit());
    }
    assert!(store.get("b").await.is_miss());

    let analysis = optimizer.analyze_hit_rate(1.0).unwrap();
    assert_eq!(analysis.total_requests, 4);
    assert_eq!(analysis.hits, 3);
    assert_eq!(analysis.misses, 1);
    assert!((analysis.hit_rate - 0.75).abs() < 1e-9);
    assert!((store.metrics_snapshot().hit_rate - analysis.hit_rate).abs() < 1e-9);

    // Identical inputs give identical output
    let again = optimizer.analyze_hit_rate(1.0).unwrap();
    assert_eq!(again.hit_rate, analysis.hit_rate);
    assert_eq!(again.trend, analysis.trend);
}

#[tokio::test]
async fn empty_log_yields_stable_zero_hit_rate() {
    let store = CacheStore::memory_only(config(10)).unwrap();
    let optimizer = CacheOptimizer::new(store, OptimizerConfig::default());

    let analysis = optimizer.analyze_hit_rate(24.0).unwrap();
    assert!(!analysis.has_data());
    assert_eq!(analysis.hit_rate, 0.0);
    assert_eq!(analysis.trend, HitRateTrend::Stable);
}

#[tokio::test]
async fn ttl_recommendation_follows_re_access_gaps() {
    let store = CacheStore::memory_only(config(10)).unwrap();
    let optimizer = CacheOptimizer::new(Arc::clone(&store), OptimizerConfig::default());

    // Key i is re-read i seconds after its first lookup, for i in 1..=1000
    let start = Utc::now() - ChronoDuration::seconds(1100);
    let mut events = Vec::new();
    for gap in 1..=1000i64 {
        let key = CacheKey::from_content(format!("report-{}", gap).as_bytes());
        events.push(AccessEvent::at(AccessEventKind::Miss, key, start));
        events.push(AccessEvent::at(
            AccessEventKind::Hit,
            key,
            start + ChronoDuration::seconds(gap),
        ));
    }
    store.access_log().record_all(events);

    let recommendation = optimizer.optimize_ttl(0.95).unwrap();
    assert_eq!(recommendation.sample_size, 1000);
    assert_eq!(recommendation.recommended_ttl_secs, 951);
    assert!((recommendation.confidence_score - 0.95).abs() < 1e-9);
    assert!(recommendation.reasoning.contains("95th percentile"));
}

#[tokio::test]
async fn ttl_recommendation_without_data_keeps_current_ttl() {
    let store = CacheStore::memory_only(config(10)).unwrap();
    let optimizer = CacheOptimizer::new(Arc::clone(&store), OptimizerConfig::default());

    let recommendation = optimizer.optimize_ttl(0.9).unwrap();
    assert_eq!(recommendation.recommended_ttl_secs, store.config().default_ttl_secs);
    assert_eq!(recommendation.confidence_score, 0.0);
    assert!(!recommendation.is_actionable());
}

#[tokio::test]
async fn unreachable_distributed_tier_degrades_to_memory_only() {
    let backend = Arc::new(UnreachableBackend::default());
    let store = CacheStore::new(config(10), backend.clone()).unwrap();

    store.set("a", "1").await.unwrap();
    assert!(store.get("a").await.is_hit());
    assert!(store.get("missing").await.is_miss());

    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    let counters = store.metrics_snapshot().counters;
    assert_eq!(counters.hits, 1);
    assert_eq!(counters.misses, 1);
    assert_eq!(counters.distributed_errors, 2);

    store.shutdown().await;
}

#[tokio::test]
async fn hot_and_cold_keys_are_separated() {
    let store = CacheStore::memory_only(config(1000)).unwrap();
    let optimizer = CacheOptimizer::new(Arc::clone(&store), OptimizerConfig::default());

    for i in 0..10 {
        let content = format!("hot-{}", i);
        store.set(&content, "v").await.unwrap();
        for _ in 0..69 {
            assert!(store.get(&content).await.is_hit());
        }
    }
    for i in 0..300 {
        store.set(format!("cold-{}", i), "v").await.unwrap();
    }

    let analysis = optimizer.analyze_access_patterns();
    assert_eq!(analysis.total_accesses, 1000);
    assert_eq!(analysis.unique_keys, 310);
    assert_eq!(analysis.hot_keys_count, 10);
    assert_eq!(analysis.cold_keys_count, 300);
    assert_eq!(analysis.top_keys.len(), 10);
    assert!(analysis.top_keys.iter().all(|k| k.accesses == 70));
}

#[tokio::test]
async fn store_built_from_configuration_uses_distributed_tier() {
    let mut config = SemanticCacheConfig::default();
    config.cache.max_size = 1;
    config.cache.maintenance_interval_secs = 0;
    config.distributed.backend = BackendKind::Memory;
    config.validate().unwrap();

    let store = CacheStore::from_config(&config).unwrap();
    assert_eq!(store.backend_name(), "memory");

    store.set("a", "1").await.unwrap();
    store.set("b", "2").await.unwrap();
    assert!(!store.contains("a"));

    // Evicted locally, served and promoted from the distributed tier
    let lookup = store.get("a").await;
    assert_matches!(lookup, CacheLookup::Hit { source: LookupSource::Distributed, .. });
    assert!(store.contains("a"));
    assert_eq!(store.metrics_snapshot().counters.distributed_hits, 1);

    store.shutdown().await;
}

#[tokio::test]
async fn report_ranks_recommendations_by_impact() {
    let store = CacheStore::memory_only(config(50)).unwrap();
    let optimizer = CacheOptimizer::new(
        Arc::clone(&store),
        OptimizerConfig {
            benchmark_requests: 200,
            ..Default::default()
        },
    );

    for i in 0..100 {
        assert!(store.get(format!("never-cached-{}", i)).await.is_miss());
    }

    let report = optimizer
        .generate_optimization_report(1.0, 0.9, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.metrics.counters.misses, 100);
    assert!(report.benchmark.is_some());
    assert!(!report.recommendations.is_empty());
    assert!(report
        .recommendations
        .windows(2)
        .all(|pair| pair[0].expected_impact_pct >= pair[1].expected_impact_pct));
}

#[tokio::test]
async fn report_does_not_disturb_later_analyses() {
    let store = CacheStore::memory_only(config(50)).unwrap();
    let optimizer = CacheOptimizer::new(Arc::clone(&store), OptimizerConfig::default());

    // 200 documents, each re-read ten minutes after the first lookup
    let start = Utc::now() - ChronoDuration::seconds(700);
    let mut events = Vec::new();
    for i in 0..200 {
        let key = CacheKey::from_content(format!("document-{}", i).as_bytes());
        events.push(AccessEvent::at(AccessEventKind::Miss, key, start));
        events.push(AccessEvent::at(
            AccessEventKind::Hit,
            key,
            start + ChronoDuration::seconds(600),
        ));
    }
    store.access_log().record_all(events);
    for i in 0..50 {
        store.set(format!("resident-{}", i), "v").await.unwrap();
    }

    let ttl_before = optimizer.optimize_ttl(0.5).unwrap();
    let hit_rate_before = optimizer.analyze_hit_rate(1.0).unwrap();
    let patterns_before = optimizer.analyze_access_patterns();
    let counters_before = store.metrics_snapshot().counters;
    let resident_before = store.keys_lru_order();
    assert_eq!(ttl_before.recommended_ttl_secs, 900);

    let report = optimizer
        .generate_optimization_report(1.0, 0.5, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.benchmark.map(|b| b.completed), Some(1000));

    let ttl_after = optimizer.optimize_ttl(0.5).unwrap();
    assert_eq!(ttl_after.recommended_ttl_secs, ttl_before.recommended_ttl_secs);
    assert_eq!(ttl_after.sample_size, 200);

    let hit_rate_after = optimizer.analyze_hit_rate(1.0).unwrap();
    assert_eq!(hit_rate_after.total_requests, hit_rate_before.total_requests);
    assert_eq!(hit_rate_after.hit_rate, hit_rate_before.hit_rate);

    let patterns_after = optimizer.analyze_access_patterns();
    assert_eq!(patterns_after.total_accesses, patterns_before.total_accesses);
    assert_eq!(patterns_after.hot_keys_count, patterns_before.hot_keys_count);

    assert_eq!(store.metrics_snapshot().counters, counters_before);
    assert_eq!(store.keys_lru_order(), resident_before);
}

#[test]
fn store_can_be_driven_from_synchronous_code() {
    tokio_test::block_on(async {
        let store = CacheStore::memory_only(config(10)).unwrap();
        store.set("sync", "v").await.unwrap();
        assert!(store.get("sync").await.is_hit());
    });
}
