//! Coordination primitives for one lock attempt
//!
//! A lock attempt runs on two tasks: the caller executes the critical
//! section, a lease monitor owns the cluster lease. They hand off through
//! three single-fire signals:
//! - "lease ready": fires exactly once with the acquired lease, or with
//!   nothing if acquisition failed
//! - "work complete": set by the caller when the critical section is over
//! - "cancel work": set by the monitor when the lease has been given up and
//!   the caller must abort
//!
//! A session lives for exactly one `do_in_try_lock` call and is split into a
//! coordinator half and a monitor half at construction.

use std::time::Duration;

use tokio::sync::{oneshot, watch};

use crate::model::ClusterMutex;

/// Build the paired handles for one lock attempt.
pub(crate) fn lock_attempt_session() -> (CoordinatorHandle, MonitorHandle) {
    let (lease_ready_tx, lease_ready_rx) = oneshot::channel();
    let (work_complete_tx, work_complete_rx) = watch::channel(false);
    let (cancel_work_tx, cancel_work_rx) = watch::channel(false);

    (
        CoordinatorHandle {
            lease_ready: lease_ready_rx,
            work_complete: work_complete_tx,
            cancel_work: cancel_work_rx,
        },
        MonitorHandle {
            lease_ready: Some(lease_ready_tx),
            work_complete: work_complete_rx,
            cancel_work: cancel_work_tx,
        },
    )
}

/// The caller task's half of a lock attempt session.
pub(crate) struct CoordinatorHandle {
    lease_ready: oneshot::Receiver<Option<ClusterMutex>>,
    work_complete: watch::Sender<bool>,
    cancel_work: watch::Receiver<bool>,
}

impl CoordinatorHandle {
    /// Wait until the monitor has attempted lease acquisition. A monitor that
    /// died without signaling counts as a failed acquisition.
    pub(crate) async fn await_lease_ready(&mut self) -> Option<ClusterMutex> {
        (&mut self.lease_ready).await.unwrap_or(None)
    }

    /// Announce that the critical section is over. Idempotent; a monitor that
    /// already exited is not an error.
    pub(crate) fn signal_work_complete(&self) {
        let _ = self.work_complete.send(true);
    }

    /// Resolves when the monitor has given up the lease and the critical
    /// section must abort. A monitor that died without cancelling resolves
    /// this too: the lease is no longer being maintained either way.
    pub(crate) async fn work_interrupted(&mut self) {
        let _ = self.cancel_work.wait_for(|cancelled| *cancelled).await;
    }
}

/// The lease monitor's half of a lock attempt session.
pub(crate) struct MonitorHandle {
    lease_ready: Option<oneshot::Sender<Option<ClusterMutex>>>,
    work_complete: watch::Receiver<bool>,
    cancel_work: watch::Sender<bool>,
}

impl MonitorHandle {
    /// Fire the "lease ready" signal. Only the first call delivers; the
    /// signal fires at most once per session.
    pub(crate) fn signal_lease_ready(&mut self, lease: Option<ClusterMutex>) {
        if let Some(sender) = self.lease_ready.take() {
            let _ = sender.send(lease);
        }
    }

    /// Wait up to `timeout` for the caller to finish. Returns true once the
    /// work is over (signal fired, or the caller dropped its half), false if
    /// the timeout elapsed first.
    pub(crate) async fn work_complete_within(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.work_complete.changed())
            .await
            .is_ok()
    }

    /// Tell the caller to abort its critical section. Idempotent.
    pub(crate) fn interrupt_work(&self) {
        let _ = self.cancel_work.send(true);
    }
}
