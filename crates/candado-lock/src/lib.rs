//! Candado Lock - Cluster-wide mutual-exclusion lock service
//!
//! This crate provides:
//! - The lock coordinator (`ClusterLockService::do_in_try_lock`)
//! - A process-local lock registry used as a fast gate before the store
//! - The lease monitor that acquires, renews, and releases cluster leases
//! - The `LeaseStore` abstraction plus an in-memory implementation
//! - Lock state queries (`is_lock_owner`, `is_locked`) and statistics
//!
//! At most one task across the entire cluster executes a named critical
//! section at any instant; a shared persistent store is the single source of
//! truth for cross-node ownership.

pub mod config;
mod executor;
pub mod metrics;
pub mod model;
mod monitor;
pub mod registry;
mod session;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use config::LockConfig;
pub use model::{ClusterMutex, LockStats, TryLockResult};
pub use registry::{LocalLock, LocalLockGuard, LocalLockRegistry};
pub use service::ClusterLockService;
pub use store::{LeaseStore, MemoryLeaseStore};
