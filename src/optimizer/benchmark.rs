//! Synthetic Benchmark
//!
//! Replays a seeded request mix against a scratch store configured like the
//! live one: a share of requests re-use keys from a small hot pool, the rest
//! use fresh keys. Each request is a lookup followed, on a miss, by a set.
//!
//! The live store is only read for its configuration, so its entries,
//! counters and access log stay exactly as the real workload left them.

use crate::cache::entry::{CacheKey, SetOptions};
use crate::cache::store::{CacheConfig, CacheStore};
use crate::error::Result;
use crate::optimizer::stats;
use crate::optimizer::OptimizerConfig;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Namespace of benchmark keys
pub const BENCHMARK_NAMESPACE: &str = "semantic-cache-benchmark";

/// Smallest hot pool used regardless of request count
const MIN_HOT_POOL: usize = 10;

/// Measured latency and throughput of a benchmark run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub requested: usize,
    pub completed: usize,
    pub hits: usize,
    pub misses: usize,
    /// Sets rejected by validation
    pub errors: usize,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub throughput_req_per_sec: f64,
    pub hit_rate: f64,
    pub elapsed_ms: f64,
    /// Run stopped early; figures cover completed requests only
    pub cancelled: bool,
}

/// Issue `num_requests` synthetic requests against a scratch copy of `store`
///
/// The scratch store shares the live store's capacity, TTL and size limits
/// but has no distributed tier, no maintenance task and its own access log.
pub async fn benchmark_performance(
    store: &CacheStore,
    num_requests: usize,
    config: &OptimizerConfig,
    cancel: &CancellationToken,
) -> Result<BenchmarkResult> {
    let scratch = CacheStore::memory_only(scratch_config(store.config()))?;
    let mut rng = StdRng::seed_from_u64(config.benchmark_seed);
    let repeated_fraction = match config.benchmark_repeated_fraction {
        f if f.is_nan() => 0.0,
        f => f.clamp(0.0, 1.0),
    };
    let hot_pool = MIN_HOT_POOL.max(num_requests / 20);

    let mut payload = vec![0u8; config.benchmark_value_bytes];
    rng.fill_bytes(&mut payload);
    let payload = Bytes::from(payload);

    // Fresh keys must not collide with a previous run's fresh keys
    let run_id: u64 = rand::random();

    let mut latencies = Vec::with_capacity(num_requests);
    let mut hits = 0;
    let mut errors = 0;
    let mut cancelled = false;

    let started = Instant::now();
    for i in 0..num_requests {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let content = if rng.gen_bool(repeated_fraction) {
            format!("hot:{}", rng.gen_range(0..hot_pool))
        } else {
            format!("unique:{}:{}", run_id, i)
        };
        let key = CacheKey::namespaced(BENCHMARK_NAMESPACE, content.as_bytes());

        let request_started = Instant::now();
        if scratch.get_by_key(&key).await.is_hit() {
            hits += 1;
        } else if scratch
            .set_key(key, payload.clone(), SetOptions::default())
            .await
            .is_err()
        {
            errors += 1;
        }
        latencies.push(request_started.elapsed().as_secs_f64() * 1000.0);

        // Let other tasks, including a cancelling one, make progress
        if i % 256 == 255 {
            tokio::task::yield_now().await;
        }
    }
    let elapsed = started.elapsed().as_secs_f64();

    let completed = latencies.len();
    let sorted = stats::sorted(latencies.iter().copied());
    let result = BenchmarkResult {
        requested: num_requests,
        completed,
        hits,
        misses: completed - hits,
        errors,
        avg_latency_ms: stats::mean(&latencies).unwrap_or(0.0),
        p50_latency_ms: stats::percentile(&sorted, 50.0).unwrap_or(0.0),
        p95_latency_ms: stats::percentile(&sorted, 95.0).unwrap_or(0.0),
        p99_latency_ms: stats::percentile(&sorted, 99.0).unwrap_or(0.0),
        throughput_req_per_sec: if elapsed > 0.0 {
            completed as f64 / elapsed
        } else {
            0.0
        },
        hit_rate: if completed == 0 {
            0.0
        } else {
            hits as f64 / completed as f64
        },
        elapsed_ms: elapsed * 1000.0,
        cancelled,
    };

    if cancelled {
        debug!(completed, requested = num_requests, "Benchmark cancelled");
    }
    info!(
        completed,
        hit_rate = result.hit_rate,
        p99_ms = result.p99_latency_ms,
        throughput = result.throughput_req_per_sec,
        "Benchmark finished"
    );
    Ok(result)
}

fn scratch_config(live: &CacheConfig) -> CacheConfig {
    CacheConfig {
        maintenance_interval_secs: 0,
        ..live.clone()
    }
}
