//! Cluster lock service
//!
//! The public entry point. `do_in_try_lock` coordinates three parties for
//! one named critical section: the process-local lock (fast gate, no store
//! round trip on local contention), a lease monitor on the background
//! executor (authoritative cluster acquisition plus heartbeats), and the
//! caller's own function. Local exclusivity is an optimization; the store's
//! atomic acquire is the sole arbiter of cluster-wide exclusivity.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;
use tracing::{trace, warn};

use candado_common::{CandadoError, is_valid_mutex_name};

use crate::config::LockConfig;
use crate::executor::MonitorExecutor;
use crate::metrics;
use crate::model::{ClusterMutex, LockStats, TryLockResult};
use crate::monitor::LeaseMonitor;
use crate::registry::LocalLockRegistry;
use crate::session::lock_attempt_session;
use crate::store::LeaseStore;

/// Cluster-wide mutual-exclusion lock service.
pub struct ClusterLockService {
    store: Arc<dyn LeaseStore>,
    config: LockConfig,
    local_locks: LocalLockRegistry,
    executor: MonitorExecutor,
    stats: Arc<LockStatsCollector>,
}

impl ClusterLockService {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self::with_config(store, LockConfig::default())
    }

    pub fn with_config(store: Arc<dyn LeaseStore>, config: LockConfig) -> Self {
        let executor = MonitorExecutor::new(config.monitor_pool_size);
        Self {
            store,
            config,
            local_locks: LocalLockRegistry::new(),
            executor,
            stats: Arc::new(LockStatsCollector::default()),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Run `work` under the cluster-wide lock `mutex_name`, if the lock is
    /// free.
    ///
    /// The attempt never waits for a contended lock: local contention is
    /// rejected without touching the store, cluster contention after one
    /// atomic acquire attempt. Either way the result is `NotExecuted` and
    /// the two are indistinguishable to the caller.
    ///
    /// While `work` runs, a background monitor heartbeats the lease every
    /// renewal interval and enforces the maximum hold duration; breaching it
    /// aborts `work` and surfaces as `CandadoError::WorkInterrupted`. On
    /// every exit path the lease is released and the monitor joined before
    /// this method returns.
    pub async fn do_in_try_lock<F, Fut, T>(
        &self,
        mutex_name: &str,
        work: F,
    ) -> anyhow::Result<TryLockResult<T>>
    where
        F: FnOnce(ClusterMutex) -> Fut,
        Fut: Future<Output = T>,
    {
        if !is_valid_mutex_name(mutex_name) {
            return Err(CandadoError::InvalidMutexName(mutex_name.to_string()).into());
        }

        trace!("do_in_try_lock({})", mutex_name);
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);
        metrics::record_attempt(mutex_name);

        let local_lock = self.local_locks.get(mutex_name);
        let Some(local_guard) = local_lock.try_acquire() else {
            trace!("local lock already held for {}", mutex_name);
            self.stats.local_rejections.fetch_add(1, Ordering::Relaxed);
            metrics::record_local_rejection(mutex_name);
            return Ok(TryLockResult::NotExecuted);
        };
        trace!("acquired local lock for {}", mutex_name);

        let (mut coordinator, monitor_half) = lock_attempt_session();
        let monitor = LeaseMonitor::new(
            self.store.clone(),
            mutex_name.to_string(),
            self.config.clone(),
            monitor_half,
            self.stats.clone(),
        );
        let monitor_task = self.executor.spawn(monitor.run());

        // Wait for the cluster acquisition attempt; the signal fires exactly
        // once, lease or no lease.
        let outcome = match coordinator.await_lease_ready().await {
            None => {
                trace!(
                    "failed to acquire cluster lease, returning NotExecuted for: {}",
                    mutex_name
                );
                self.stats
                    .cluster_rejections
                    .fetch_add(1, Ordering::Relaxed);
                metrics::record_cluster_rejection(mutex_name);
                Ok(TryLockResult::NotExecuted)
            }
            Some(lease) => {
                let started = Instant::now();
                tokio::select! {
                    value = work(lease) => {
                        let held = started.elapsed();
                        self.stats.executions.fetch_add(1, Ordering::Relaxed);
                        self.stats
                            .total_hold_time_ms
                            .fetch_add(held.as_millis() as u64, Ordering::Relaxed);
                        self.stats.completed_holds.fetch_add(1, Ordering::Relaxed);
                        metrics::record_execution(mutex_name, held.as_secs_f64());
                        Ok(TryLockResult::Executed(value))
                    }
                    _ = coordinator.work_interrupted() => {
                        self.stats.interruptions.fetch_add(1, Ordering::Relaxed);
                        metrics::record_interruption(mutex_name);
                        Err(CandadoError::WorkInterrupted(mutex_name.to_string()).into())
                    }
                }
            }
        };

        // Guaranteed cleanup, on every path above: let the monitor release
        // the lease, observe its termination, then free the local lock.
        coordinator.signal_work_complete();
        match monitor_task.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(
                "lease monitor for '{}' failed; everything is cleaned up but this could indicate a problem with cluster locking: {:#}",
                mutex_name, e
            ),
            Err(e) => warn!(
                "lease monitor task for '{}' did not run to completion: {}",
                mutex_name, e
            ),
        }
        drop(local_guard);
        trace!("released local lock for: {}", mutex_name);

        outcome
    }

    /// True iff the calling task currently holds the local lock for
    /// `mutex_name`. No cluster round trip.
    pub fn is_lock_owner(&self, mutex_name: &str) -> bool {
        self.local_locks.get(mutex_name).is_held_by_current_task()
    }

    /// True if the local lock is held by anyone, or the store reports the
    /// cluster lease as held. Best-effort snapshot; may be stale the instant
    /// it returns.
    pub async fn is_locked(&self, mutex_name: &str) -> anyhow::Result<bool> {
        if self.local_locks.get(mutex_name).is_held() {
            return Ok(true);
        }
        Ok(self.store.read(mutex_name).await?.is_some())
    }

    /// Snapshot of the service counters.
    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Drop registry entries for mutex names with no live lock attempt.
    pub fn purge_local_locks(&self) {
        self.local_locks.purge_unreferenced();
    }
}

/// Shared counters behind `ClusterLockService::stats`.
#[derive(Default)]
pub(crate) struct LockStatsCollector {
    pub(crate) attempts: AtomicU64,
    pub(crate) local_rejections: AtomicU64,
    pub(crate) cluster_rejections: AtomicU64,
    pub(crate) executions: AtomicU64,
    pub(crate) interruptions: AtomicU64,
    pub(crate) renewals: AtomicU64,
    pub(crate) total_hold_time_ms: AtomicU64,
    pub(crate) completed_holds: AtomicU64,
}

impl LockStatsCollector {
    fn snapshot(&self) -> LockStats {
        let completed = self.completed_holds.load(Ordering::Relaxed);
        let total_hold = self.total_hold_time_ms.load(Ordering::Relaxed);
        let avg_hold = if completed > 0 {
            total_hold / completed
        } else {
            0
        };

        LockStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            local_rejections: self.local_rejections.load(Ordering::Relaxed),
            cluster_rejections: self.cluster_rejections.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            interruptions: self.interruptions.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            avg_hold_time_ms: avg_hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::MemoryLeaseStore;

    use super::*;

    fn service() -> ClusterLockService {
        ClusterLockService::new(Arc::new(MemoryLeaseStore::new()))
    }

    #[tokio::test]
    async fn test_executes_work_under_free_lock() {
        let service = service();

        let result = service
            .do_in_try_lock("mutex-a", |lease| async move {
                assert_eq!(lease.name, "mutex-a");
                42
            })
            .await
            .unwrap();

        assert_eq!(result, TryLockResult::Executed(42));
        // Everything was cleaned up
        assert!(!service.is_locked("mutex-a").await.unwrap());
    }

    #[tokio::test]
    async fn test_cluster_held_name_is_not_executed() {
        let store = Arc::new(MemoryLeaseStore::new());
        store.acquire("mutex-b").await.unwrap();
        let service = ClusterLockService::new(store);

        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = invoked.clone();
        let result = service
            .do_in_try_lock("mutex-b", move |_| async move {
                flag.store(true, Ordering::Relaxed);
            })
            .await
            .unwrap();

        assert_eq!(result, TryLockResult::NotExecuted);
        assert!(!invoked.load(Ordering::Relaxed), "work must never run");
        let stats = service.stats();
        assert_eq!(stats.cluster_rejections, 1);
        assert_eq!(stats.executions, 0);
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let service = service();
        let err = service
            .do_in_try_lock("", |_| async move { 1 })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CandadoError>(),
            Some(CandadoError::InvalidMutexName(_))
        ));
    }

    #[tokio::test]
    async fn test_work_error_value_propagates_after_cleanup() {
        let service = service();

        let result = service
            .do_in_try_lock("mutex-a", |_| async move {
                Err::<i32, _>(anyhow::anyhow!("critical section failed"))
            })
            .await
            .unwrap();

        let value = result.into_result().expect("work did execute");
        assert_eq!(value.unwrap_err().to_string(), "critical section failed");
        // The failure did not leak the lease or the local lock
        assert!(!service.is_locked("mutex-a").await.unwrap());
        let again = service
            .do_in_try_lock("mutex-a", |_| async move { 1 })
            .await
            .unwrap();
        assert!(again.is_executed());
    }

    #[tokio::test]
    async fn test_is_lock_owner_tracks_holder() {
        let service = Arc::new(service());

        assert!(!service.is_lock_owner("mutex-a"));

        let inner = service.clone();
        service
            .do_in_try_lock("mutex-a", |_| {
                let inner = inner.clone();
                async move {
                    assert!(inner.is_lock_owner("mutex-a"));
                }
            })
            .await
            .unwrap();

        assert!(!service.is_lock_owner("mutex-a"));
    }

    #[tokio::test]
    async fn test_is_locked_sees_foreign_lease() {
        let store = Arc::new(MemoryLeaseStore::new());
        let service = ClusterLockService::new(store.clone());

        assert!(!service.is_locked("mutex-a").await.unwrap());
        store.acquire("mutex-a").await.unwrap();
        assert!(service.is_locked("mutex-a").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let service = service();

        for _ in 0..3 {
            service
                .do_in_try_lock("mutex-a", |_| async move {})
                .await
                .unwrap();
        }

        let stats = service.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.executions, 3);
        assert_eq!(stats.local_rejections, 0);
        assert_eq!(stats.cluster_rejections, 0);
    }
}
