//! Cache Warming Pool
//!
//! A fixed number of workers drain a shared queue of samples. The pool runs
//! inside the caller's task, so the compute callback may borrow freely, and
//! the whole batch is bounded by one deadline.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of concurrent warm workers
pub const DEFAULT_WARM_CONCURRENCY: usize = 8;

/// Default deadline for a warm batch
pub const DEFAULT_WARM_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for cache warming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmConfig {
    /// Maximum samples computed at once
    pub max_concurrent: usize,
    /// Deadline for the whole batch in seconds (0 = no deadline)
    pub timeout_secs: u64,
}

impl Default for WarmConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_WARM_CONCURRENCY,
            timeout_secs: DEFAULT_WARM_TIMEOUT_SECS,
        }
    }
}

impl WarmConfig {
    /// Batch deadline, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Outcome of a warm batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmSummary {
    /// Samples handed to the pool
    pub submitted: usize,
    /// Samples computed and cached
    pub succeeded: usize,
    /// Samples whose compute or set failed
    pub failed: usize,
    /// Samples not finished before the deadline
    pub timed_out: usize,
}

impl WarmSummary {
    /// Number of samples successfully cached
    pub fn cached(&self) -> usize {
        self.succeeded
    }

    /// Whether every sample was cached
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.submitted
    }
}

// =============================================================================
// Worker Pool
// =============================================================================

/// Drain `items` through `job` with at most `config.max_concurrent` in flight
///
/// Individual failures are counted, never abort the batch.
pub(crate) async fn run_pool<T, F, Fut>(items: Vec<T>, config: &WarmConfig, job: F) -> WarmSummary
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let submitted = items.len();
    if submitted == 0 {
        return WarmSummary::default();
    }

    let workers = config.max_concurrent.max(1).min(submitted);
    let queue = parking_lot::Mutex::new(VecDeque::from(items));
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let (queue, succeeded, failed, job) = (&queue, &succeeded, &failed, &job);
    let worker = move |id: usize| async move {
        loop {
            let next = queue.lock().pop_front();
            let Some(item) = next else {
                break;
            };
            match job(item).await {
                Ok(()) => {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    debug!(worker = id, error = %e, "Warm sample failed");
                }
            }
        }
    };

    let batch = futures::future::join_all((0..workers).map(worker));
    match config.timeout() {
        Some(deadline) => {
            if tokio::time::timeout(deadline, batch).await.is_err() {
                warn!(
                    timeout_secs = config.timeout_secs,
                    "Warm batch deadline elapsed"
                );
            }
        }
        None => {
            batch.await;
        }
    }

    let succeeded = succeeded.load(Ordering::Relaxed);
    let failed = failed.load(Ordering::Relaxed);
    WarmSummary {
        submitted,
        succeeded,
        failed,
        timed_out: submitted - succeeded - failed,
    }
}
