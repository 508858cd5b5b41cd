//! Lease monitor background task
//!
//! One monitor owns the cluster lease's full lifecycle for one lock attempt,
//! independent of what the caller task does with it: acquire, signal the
//! caller, heartbeat while the caller works, enforce the maximum hold time,
//! and release on every exit path. Per attempt the lease moves through
//! acquiring, held-and-renewing, releasing; a failed acquisition ends the
//! task immediately.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::config::LockConfig;
use crate::metrics;
use crate::service::LockStatsCollector;
use crate::session::MonitorHandle;
use crate::store::LeaseStore;

pub(crate) struct LeaseMonitor {
    store: Arc<dyn LeaseStore>,
    mutex_name: String,
    config: LockConfig,
    session: MonitorHandle,
    stats: Arc<LockStatsCollector>,
}

impl LeaseMonitor {
    pub(crate) fn new(
        store: Arc<dyn LeaseStore>,
        mutex_name: String,
        config: LockConfig,
        session: MonitorHandle,
        stats: Arc<LockStatsCollector>,
    ) -> Self {
        Self {
            store,
            mutex_name,
            config,
            session,
            stats,
        }
    }

    /// Acquire, maintain, and release the cluster lease.
    ///
    /// Returns `Ok(true)` when the lease was held and fully cleaned up,
    /// `Ok(false)` when acquisition failed because the name is already held.
    /// Errors are this task's own failure: the coordinator observes them on
    /// join and logs them; they never reach the critical section's caller.
    pub(crate) async fn run(mut self) -> anyhow::Result<bool> {
        // The "lease ready" signal fires on every path out of this block so
        // the caller task never waits forever, even when acquisition fails.
        let acquired = match self.store.acquire(&self.mutex_name).await {
            Ok(lease) => {
                let acquired = lease.is_some();
                self.session.signal_lease_ready(lease);
                acquired
            }
            Err(e) => {
                // The caller sees ordinary contention; the error remains this
                // task's own terminal failure.
                self.session.signal_lease_ready(None);
                return Err(e).with_context(|| {
                    format!("lease acquisition failed for '{}'", self.mutex_name)
                });
            }
        };

        if !acquired {
            trace!("failed to acquire cluster lease for: {}", self.mutex_name);
            return Ok(false);
        }
        trace!("acquired cluster lease for: {}", self.mutex_name);
        metrics::record_lease_acquired();

        let held = self.hold_lease().await;
        if let Err(e) = &held {
            warn!(
                "lease monitor for '{}' failed while the lease was held: {:#}",
                self.mutex_name, e
            );
            // The caller may still be in its critical section; break its wait
            // before giving up the lease.
            self.session.interrupt_work();
        }

        let released = self
            .store
            .release(&self.mutex_name)
            .await
            .with_context(|| format!("failed to release cluster lease for '{}'", self.mutex_name));
        metrics::record_lease_released();
        match &released {
            Ok(()) => trace!("released cluster lease for: {}", self.mutex_name),
            Err(e) => warn!("{:#}", e),
        }

        held?;
        released?;
        Ok(true)
    }

    /// Renewal loop: wait for the caller in renewal-interval slices. A slice
    /// that ends without the work-complete signal means the caller is still
    /// working, so heartbeat the lease and re-check the absolute ceiling.
    async fn hold_lease(&mut self) -> anyhow::Result<()> {
        let deadline = Instant::now() + self.config.max_hold();

        loop {
            if self
                .session
                .work_complete_within(self.config.renewal_interval())
                .await
            {
                return Ok(());
            }

            self.store
                .renew(&self.mutex_name)
                .await
                .with_context(|| format!("failed to renew cluster lease for '{}'", self.mutex_name))?;
            self.stats.renewals.fetch_add(1, Ordering::Relaxed);
            metrics::record_renewal(&self.mutex_name);
            trace!("renewed cluster lease for: {}", self.mutex_name);

            if Instant::now() >= deadline {
                // No critical section may hold a cluster lease forever, even
                // if it hangs.
                self.session.interrupt_work();
                anyhow::bail!(
                    "cluster lease for '{}' held longer than {}ms, giving up and releasing it; the worker task will be interrupted",
                    self.mutex_name,
                    self.config.max_hold_ms
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::model::ClusterMutex;
    use crate::session::lock_attempt_session;
    use crate::store::MemoryLeaseStore;

    use super::*;

    struct FailingStore;

    #[async_trait]
    impl LeaseStore for FailingStore {
        async fn acquire(&self, _name: &str) -> anyhow::Result<Option<ClusterMutex>> {
            anyhow::bail!("store unavailable")
        }

        async fn renew(&self, _name: &str) -> anyhow::Result<()> {
            anyhow::bail!("store unavailable")
        }

        async fn release(&self, _name: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn read(&self, _name: &str) -> anyhow::Result<Option<ClusterMutex>> {
            Ok(None)
        }
    }

    fn test_config(renewal_ms: u64, max_hold_ms: u64) -> LockConfig {
        LockConfig {
            renewal_interval_ms: renewal_ms,
            max_hold_ms,
            ..LockConfig::default()
        }
    }

    #[tokio::test]
    async fn test_releases_lease_after_work_completes() {
        let store = Arc::new(MemoryLeaseStore::new());
        let (coordinator, monitor_half) = lock_attempt_session();
        let monitor = LeaseMonitor::new(
            store.clone(),
            "mutex-a".to_string(),
            test_config(10_000, 900_000),
            monitor_half,
            Arc::new(LockStatsCollector::default()),
        );

        let task = tokio::spawn(monitor.run());
        coordinator.signal_work_complete();

        assert!(task.await.unwrap().unwrap());
        assert!(store.is_empty(), "lease must be released");
    }

    #[tokio::test]
    async fn test_failed_acquisition_signals_none() {
        let store = Arc::new(MemoryLeaseStore::new());
        store.acquire("mutex-a").await.unwrap();

        let (mut coordinator, monitor_half) = lock_attempt_session();
        let monitor = LeaseMonitor::new(
            store.clone(),
            "mutex-a".to_string(),
            test_config(10_000, 900_000),
            monitor_half,
            Arc::new(LockStatsCollector::default()),
        );

        let task = tokio::spawn(monitor.run());
        assert!(coordinator.await_lease_ready().await.is_none());
        assert!(!task.await.unwrap().unwrap());

        // The foreign lease is not touched
        assert!(store.read("mutex-a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_acquisition_error_looks_like_contention() {
        let (mut coordinator, monitor_half) = lock_attempt_session();
        let monitor = LeaseMonitor::new(
            Arc::new(FailingStore),
            "mutex-a".to_string(),
            test_config(10_000, 900_000),
            monitor_half,
            Arc::new(LockStatsCollector::default()),
        );

        let task = tokio::spawn(monitor.run());
        // The caller observes plain contention
        assert!(coordinator.await_lease_ready().await.is_none());
        // The monitor's own result carries the store failure
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_renews_while_work_runs() {
        let store = Arc::new(MemoryLeaseStore::new());
        let stats = Arc::new(LockStatsCollector::default());
        let (coordinator, monitor_half) = lock_attempt_session();
        let monitor = LeaseMonitor::new(
            store.clone(),
            "mutex-a".to_string(),
            test_config(20, 60_000),
            monitor_half,
            stats.clone(),
        );

        let task = tokio::spawn(monitor.run());
        tokio::time::sleep(Duration::from_millis(110)).await;
        coordinator.signal_work_complete();

        assert!(task.await.unwrap().unwrap());
        let renewals = stats.renewals.load(Ordering::Relaxed);
        assert!(
            (2..=8).contains(&renewals),
            "expected a handful of renewals, got {renewals}"
        );
    }

    #[tokio::test]
    async fn test_max_hold_breach_interrupts_and_releases() {
        let store = Arc::new(MemoryLeaseStore::new());
        let (mut coordinator, monitor_half) = lock_attempt_session();
        let monitor = LeaseMonitor::new(
            store.clone(),
            "mutex-a".to_string(),
            test_config(20, 60),
            monitor_half,
            Arc::new(LockStatsCollector::default()),
        );

        let task = tokio::spawn(monitor.run());

        // Never signal completion: the monitor must give up on its own,
        // interrupt the caller, and release the lease.
        coordinator.work_interrupted().await;
        assert!(task.await.unwrap().is_err());
        assert!(store.is_empty(), "lease must be force-released");
    }
}
