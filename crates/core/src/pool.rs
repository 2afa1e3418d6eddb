//! Bounded worker pool shared by the acquisition and compression stages.
//!
//! A pool runs one async task per item with at most `bound` tasks in
//! flight. Failures are counted, never propagated: a failing or panicking
//! task does not cancel its siblings. Every submitted item ends up in the
//! [`AggregateResult`] as either attempted or skipped.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;

/// Run-level summary of one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Items handed to the pool.
    pub submitted: usize,
    /// Items whose task was started.
    pub attempted: usize,
    /// Started items that failed.
    pub failed: usize,
    /// Items never started because the run was cancelled.
    pub skipped: usize,
}

impl AggregateResult {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }

    /// A run succeeds when no started item failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted {}, succeeded {}, failed {}, skipped {}",
            self.attempted,
            self.succeeded(),
            self.failed,
            self.skipped
        )
    }
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub active_jobs: usize,
    pub max_concurrent: usize,
    /// Highest number of simultaneously running tasks seen.
    pub peak_active: usize,
    pub total_processed: u64,
    pub total_failed: u64,
}

/// Tracks statistics for a pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    peak: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, failed: bool) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.total_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            peak_active: self.peak.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the active count even when the task panics.
struct ActiveGuard {
    stats: Arc<PoolStats>,
    metrics: Option<Metrics>,
    name: &'static str,
    failed: bool,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.stats.leave(self.failed);
        if let Some(metrics) = &self.metrics {
            metrics.task_finished(self.name);
        }
    }
}

/// A bounded pool of async workers.
pub struct WorkerPool {
    name: &'static str,
    bound: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    cancel: CancellationToken,
    metrics: Option<Metrics>,
}

impl WorkerPool {
    /// Creates a pool running at most `bound` tasks at once.
    ///
    /// A bound of zero is raised to one.
    pub fn new(name: &'static str, bound: usize) -> Self {
        let bound = bound.max(1);
        Self {
            name,
            bound,
            semaphore: Arc::new(Semaphore::new(bound)),
            stats: Arc::new(PoolStats::default()),
            cancel: CancellationToken::new(),
            metrics: None,
        }
    }

    /// Stops admitting items once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(self.name, self.bound)
    }

    /// Runs `work` for every item and waits for all started tasks.
    ///
    /// Results are collected in completion order. Cancellation stops
    /// admission only; started tasks run to completion.
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, work: F) -> AggregateResult
    where
        I: Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut result = AggregateResult {
            submitted: items.len(),
            ..Default::default()
        };
        let mut tasks = JoinSet::new();

        info!(pool = self.name, items = result.submitted, bound = self.bound, "Pool run started");

        for item in items {
            if self.cancel.is_cancelled() {
                result.skipped += 1;
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    result.skipped += 1;
                    continue;
                }
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        result.skipped += 1;
                        continue;
                    }
                },
            };

            result.attempted += 1;
            self.stats.enter();
            if let Some(metrics) = &self.metrics {
                metrics.task_started(self.name);
            }
            let guard = ActiveGuard {
                stats: self.stats.clone(),
                metrics: self.metrics.clone(),
                name: self.name,
                failed: true,
            };
            let fut = work(item);

            tasks.spawn(async move {
                // Locals drop in reverse: the guard leaves before the permit frees a slot.
                let _permit = permit;
                let mut guard = guard;
                let outcome = fut.await;
                guard.failed = outcome.is_err();
                outcome.map(|_| ()).map_err(|e| e.to_string())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(Ok(())) => "succeeded",
                Ok(Err(e)) => {
                    warn!(pool = self.name, error = %e, "Task failed");
                    result.failed += 1;
                    "failed"
                }
                Err(e) => {
                    error!(pool = self.name, error = %e, "Task panicked or was aborted");
                    result.failed += 1;
                    "failed"
                }
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_item(self.name, outcome);
            }
        }

        if let Some(metrics) = &self.metrics {
            for _ in 0..result.skipped {
                metrics.record_item(self.name, "skipped");
            }
        }
        if result.skipped > 0 {
            debug!(pool = self.name, skipped = result.skipped, "Items skipped after cancellation");
        }
        info!(pool = self.name, %result, "Pool run finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_counts_failures_without_cancelling_siblings() {
        let pool = WorkerPool::new("test", 2);
        let done = Arc::new(AtomicUsize::new(0));

        let result = pool
            .run((0..6).collect(), |n: u32| {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    if n % 3 == 0 {
                        Err(format!("item {n} failed"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert_eq!(result.submitted, 6);
        assert_eq!(result.attempted, 6);
        assert_eq!(result.failed, 2);
        assert_eq!(result.succeeded(), 4);
        assert!(!result.is_success());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_peak_concurrency_respects_bound() {
        let pool = WorkerPool::new("burst", 3);
        let running = Arc::new(AtomicUsize::new(0));
        let observed = Arc::new(AtomicUsize::new(0));

        let result = pool
            .run((0..12).collect(), |_: u32| {
                let running = running.clone();
                let observed = observed.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    observed.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            })
            .await;

        assert!(result.is_success());
        let status = pool.status();
        let observed = observed.load(Ordering::SeqCst);
        assert!(observed >= 2, "observed {observed}");
        assert!(status.peak_active <= 3, "peak {}", status.peak_active);
        assert!(status.peak_active >= observed, "peak {} < observed {observed}", status.peak_active);
        assert_eq!(status.active_jobs, 0);
        assert_eq!(status.total_processed, 12);
        assert_eq!(status.total_failed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counters_match_outcomes() {
        let metrics = Metrics::new().unwrap();
        let pool = WorkerPool::new("mixed", 2).with_metrics(metrics.clone());
        let mid_run = Arc::new(Mutex::new(Vec::new()));

        let result = pool
            .run((0..8).collect(), |n: u32| {
                let metrics = metrics.clone();
                let mid_run = mid_run.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    mid_run.lock().unwrap().push(metrics.active_tasks("mixed"));
                    if n % 4 == 0 {
                        Err(format!("item {n} failed"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        let status = pool.status();
        assert_eq!(result.failed, 2);
        assert_eq!(status.total_failed, result.failed as u64);
        assert_eq!(status.total_processed, result.attempted as u64);
        assert!(status.peak_active >= 1 && status.peak_active <= 2);
        // A running task is always counted in the gauge.
        assert!(mid_run.lock().unwrap().iter().all(|&active| active >= 1));
        assert_eq!(metrics.active_tasks("mixed"), 0);
    }

    #[tokio::test]
    async fn test_panicking_task_is_counted() {
        let pool = WorkerPool::new("panic", 2);
        let result = pool
            .run(vec![1u32, 2, 3], |n| async move {
                if n == 2 {
                    panic!("boom");
                }
                Ok::<_, String>(())
            })
            .await;

        assert_eq!(result.attempted, 3);
        assert_eq!(result.failed, 1);
        assert_eq!(pool.status().active_jobs, 0);
    }

    #[tokio::test]
    async fn test_cancelled_pool_skips_remaining_items() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::new("cancel", 1).with_cancellation(cancel.clone());
        let started = Arc::new(AtomicUsize::new(0));

        let result = pool
            .run((0..5).collect(), |_: u32| {
                let cancel = cancel.clone();
                let started = started.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    cancel.cancel();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, String>(())
                }
            })
            .await;

        assert_eq!(result.attempted + result.skipped, 5);
        assert_eq!(result.attempted, started.load(Ordering::SeqCst));
        assert!(result.skipped >= 1);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let pool = WorkerPool::new("empty", 4);
        let result = pool
            .run(Vec::<u32>::new(), |_| async { Ok::<_, String>(()) })
            .await;
        assert_eq!(result, AggregateResult::default());
        assert!(result.is_success());
    }

    #[test]
    fn test_zero_bound_is_raised() {
        assert_eq!(WorkerPool::new("zero", 0).bound(), 1);
    }
}
