//! Cluster lock data model

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Authoritative record that a mutex name is currently held somewhere in the
/// cluster.
///
/// A `ClusterMutex` mirrors one live lease row in the shared store: it exists
/// while the lease is held and is deleted on release. The store enforces that
/// at most one row per name exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMutex {
    /// Mutex name (the unit of cluster-wide locking)
    pub name: String,
    /// Identity of the server process holding the lease
    pub server_id: String,
    /// Acquisition timestamp (Unix millis)
    pub locked_at: i64,
    /// Last heartbeat timestamp (Unix millis)
    pub last_renewed_at: i64,
}

impl ClusterMutex {
    /// Create a lease record for `name` held by `server_id`, stamped now.
    pub fn new(name: impl Into<String>, server_id: impl Into<String>) -> Self {
        let now = current_timestamp();
        Self {
            name: name.into(),
            server_id: server_id.into(),
            locked_at: now,
            last_renewed_at: now,
        }
    }

    /// Record a heartbeat.
    pub fn touch(&mut self) {
        self.last_renewed_at = current_timestamp();
    }

    /// Milliseconds since the last heartbeat.
    pub fn millis_since_renewal(&self) -> i64 {
        current_timestamp() - self.last_renewed_at
    }

    /// Milliseconds the lease has been held.
    pub fn held_millis(&self) -> i64 {
        current_timestamp() - self.locked_at
    }
}

/// Outcome of one `do_in_try_lock` attempt.
///
/// `NotExecuted` covers both local and cluster contention; the caller cannot
/// tell the two apart from the result alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TryLockResult<T> {
    /// The critical section ran; carries its return value.
    Executed(T),
    /// The lock was contended and the critical section never ran.
    NotExecuted,
}

impl<T> TryLockResult<T> {
    /// Whether the caller's function actually executed.
    pub fn is_executed(&self) -> bool {
        matches!(self, TryLockResult::Executed(_))
    }

    /// The function's result, if it executed.
    pub fn result(&self) -> Option<&T> {
        match self {
            TryLockResult::Executed(value) => Some(value),
            TryLockResult::NotExecuted => None,
        }
    }

    /// Consume the attempt and take the function's result, if it executed.
    pub fn into_result(self) -> Option<T> {
        match self {
            TryLockResult::Executed(value) => Some(value),
            TryLockResult::NotExecuted => None,
        }
    }
}

/// Lock service statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    /// Total do_in_try_lock attempts
    pub attempts: u64,
    /// Attempts rejected at the local lock (no store round trip)
    pub local_rejections: u64,
    /// Attempts rejected because the cluster lease was already held
    pub cluster_rejections: u64,
    /// Critical sections that actually executed
    pub executions: u64,
    /// Critical sections interrupted because the lease was given up
    pub interruptions: u64,
    /// Lease heartbeat renewals issued by monitors
    pub renewals: u64,
    /// Average hold time of completed critical sections in milliseconds
    pub avg_hold_time_ms: u64,
}

/// Current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
