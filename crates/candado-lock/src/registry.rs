//! Process-local lock registry
//!
//! Every mutex name maps to a single `LocalLock` instance shared by all
//! callers in the process. The registry holds weak references: once no lock
//! attempt references an entry it is collectible, so the map does not grow
//! with the lifetime of the process. A lock with no outstanding holder
//! carries no state worth preserving, so recreation is free.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide mapping from mutex name to its local lock.
#[derive(Default)]
pub struct LocalLockRegistry {
    locks: DashMap<String, Weak<LocalLock>>,
}

impl LocalLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// The local lock for `name`.
    ///
    /// Returns the same instance for the same name as long as anyone holds a
    /// reference to it; a collected lock is transparently recreated. Never
    /// blocks, never fails.
    pub fn get(&self, name: &str) -> Arc<LocalLock> {
        if let Some(entry) = self.locks.get(name)
            && let Some(lock) = entry.upgrade()
        {
            return lock;
        }

        // Entry API so two tasks racing on the first lookup of a name agree
        // on one instance.
        let mut entry = self.locks.entry(name.to_string()).or_insert_with(Weak::new);
        if let Some(lock) = entry.upgrade() {
            return lock;
        }
        let lock = Arc::new(LocalLock::new());
        *entry = Arc::downgrade(&lock);
        lock
    }

    /// Drop registry entries whose lock has been collected.
    pub fn purge_unreferenced(&self) {
        self.locks.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of registry entries, dead weak entries included.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Fair, exclusive, owner-tracked lock for one mutex name.
///
/// Acquisition is non-blocking (`try_acquire`); waiters queued on the
/// underlying semaphore are served FIFO. The lock is released only by
/// dropping the guard on the task that acquired it.
pub struct LocalLock {
    semaphore: Arc<Semaphore>,
    owner: Arc<Mutex<Option<tokio::task::Id>>>,
}

impl LocalLock {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            owner: Arc::new(Mutex::new(None)),
        }
    }

    /// Try to take the lock without waiting. Records the acquiring task as
    /// owner; ownership ends when the returned guard drops.
    pub fn try_acquire(&self) -> Option<LocalLockGuard> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        *self.owner.lock() = tokio::task::try_id();
        Some(LocalLockGuard {
            owner: self.owner.clone(),
            _permit: permit,
        })
    }

    /// True if any task currently holds this lock.
    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// True only on the task that currently holds this lock.
    pub fn is_held_by_current_task(&self) -> bool {
        match (*self.owner.lock(), tokio::task::try_id()) {
            (Some(owner), Some(current)) => owner == current,
            _ => false,
        }
    }
}

/// RAII holder of a `LocalLock`; dropping it releases the lock.
pub struct LocalLockGuard {
    owner: Arc<Mutex<Option<tokio::task::Id>>>,
    // Dropped after `Drop::drop` clears the owner, so the lock never looks
    // acquirable while still attributed to the previous task.
    _permit: OwnedSemaphorePermit,
}

impl Drop for LocalLockGuard {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}
