//! Lease store abstraction
//!
//! The store is the single source of truth for cross-node ownership: its
//! `acquire` is the sole arbiter of cluster exclusivity. Implementations must
//! guarantee that at most one live lease row per name exists at a time.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use candado_common::{CandadoError, local_server_id};

use crate::model::ClusterMutex;

/// Client for the shared lease store.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically create a lease for `name` iff none exists. Returns the
    /// lease, or `None` if the name is already held cluster-wide. An
    /// implementation may reclaim a lease whose holder stopped heartbeating
    /// longer ago than its configured lease timeout.
    async fn acquire(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>>;

    /// Heartbeat an existing lease. Only safe to call while the caller still
    /// believes it holds the lease; an absent lease is an error (the lease
    /// was lost).
    async fn renew(&self, name: &str) -> anyhow::Result<()>;

    /// Delete the lease. Idempotent: releasing a name with no active lease
    /// is not an error.
    async fn release(&self, name: &str) -> anyhow::Result<()>;

    /// Non-authoritative snapshot read; no side effects.
    async fn read(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>>;
}

/// Single-process lease store backed by a concurrent map.
///
/// Serves as the arbiter for standalone deployments and as the store for
/// every test in this crate. The map entry is the lease row: present means
/// held, absent means free.
pub struct MemoryLeaseStore {
    leases: DashMap<String, ClusterMutex>,
    server_id: String,
    lease_timeout_ms: Option<i64>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self {
            leases: DashMap::new(),
            server_id: local_server_id(),
            lease_timeout_ms: None,
        }
    }

    /// Reclaim leases on acquire once their last heartbeat is older than
    /// `timeout` (a crashed holder never releases; its row must not pin the
    /// name forever).
    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout_ms = Some(timeout.as_millis() as i64);
        self
    }

    /// Number of live leases.
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    fn is_abandoned(&self, lease: &ClusterMutex) -> bool {
        match self.lease_timeout_ms {
            Some(timeout) => lease.millis_since_renewal() > timeout,
            None => false,
        }
    }
}

impl Default for MemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn acquire(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>> {
        match self.leases.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.is_abandoned(occupied.get()) {
                    tracing::warn!(
                        "reclaiming abandoned lease for '{}' last renewed by {}",
                        name,
                        occupied.get().server_id
                    );
                    let lease = ClusterMutex::new(name, &self.server_id);
                    occupied.insert(lease.clone());
                    Ok(Some(lease))
                } else {
                    Ok(None)
                }
            }
            Entry::Vacant(vacant) => {
                let lease = ClusterMutex::new(name, &self.server_id);
                vacant.insert(lease.clone());
                Ok(Some(lease))
            }
        }
    }

    async fn renew(&self, name: &str) -> anyhow::Result<()> {
        match self.leases.get_mut(name) {
            Some(mut lease) => {
                lease.touch();
                Ok(())
            }
            None => Err(CandadoError::LeaseLost(name.to_string()).into()),
        }
    }

    async fn release(&self, name: &str) -> anyhow::Result<()> {
        self.leases.remove(name);
        Ok(())
    }

    async fn read(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>> {
        Ok(self.leases.get(name).map(|l| l.clone()))
    }
}
