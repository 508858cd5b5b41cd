//! Bounded background executor for lease monitors
//!
//! Each lock attempt that wins its local lock submits one monitor task here.
//! The pool is bounded: beyond `pool_size` concurrently running monitors,
//! submissions queue on the semaphore in FIFO order, which also delays their
//! "lease ready" signal exactly as a saturated executor queue would.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use candado_common::CandadoError;

pub(crate) struct MonitorExecutor {
    permits: Arc<Semaphore>,
}

impl MonitorExecutor {
    pub(crate) fn new(pool_size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Spawn `task` once a pool slot is free; the handle resolves with the
    /// task's own result and exposes its failure to the awaiting caller.
    pub(crate) fn spawn<T, F>(&self, task: F) -> JoinHandle<anyhow::Result<T>>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| CandadoError::ExecutorUnavailable(e.to_string()))?;
            task.await
        })
    }
}
