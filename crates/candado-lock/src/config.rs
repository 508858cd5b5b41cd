// Lock service configuration
// Tunables for the lease renewal protocol and the monitor pool

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration key for the renewal interval
pub const RENEWAL_INTERVAL_PROPERTY: &str = "candado.lock.renewal_interval_ms";
/// Configuration key for the maximum hold duration
pub const MAX_HOLD_PROPERTY: &str = "candado.lock.max_hold_ms";
/// Configuration key for the monitor pool size
pub const MONITOR_POOL_PROPERTY: &str = "candado.lock.monitor_pool_size";

/// Configuration for the cluster lock service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Heartbeat period while a lease is held, in milliseconds (default: 10000ms)
    /// Each time this elapses without the caller finishing, the monitor renews
    /// the lease in the store
    pub renewal_interval_ms: u64,

    /// Absolute cap on how long one attempt may hold a lease, in milliseconds
    /// (default: 900000ms = 15 minutes)
    /// Functionally the longest a critical section may take to execute;
    /// breaching it interrupts the caller and forces a release
    pub max_hold_ms: u64,

    /// Maximum number of lease monitors running concurrently (default: 16)
    /// Further lock attempts queue until a monitor slot frees up
    pub monitor_pool_size: usize,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            renewal_interval_ms: 10_000,
            max_hold_ms: 900_000, // 15 minutes
            monitor_pool_size: 16,
        }
    }
}

impl LockConfig {
    /// Read the lock settings out of an application configuration, falling
    /// back to the defaults for any key that is absent.
    pub fn from_config(config: &config::Config) -> Self {
        let defaults = Self::default();
        Self {
            renewal_interval_ms: config
                .get_int(RENEWAL_INTERVAL_PROPERTY)
                .map(|v| v as u64)
                .unwrap_or(defaults.renewal_interval_ms),
            max_hold_ms: config
                .get_int(MAX_HOLD_PROPERTY)
                .map(|v| v as u64)
                .unwrap_or(defaults.max_hold_ms),
            monitor_pool_size: config
                .get_int(MONITOR_POOL_PROPERTY)
                .map(|v| v as usize)
                .unwrap_or(defaults.monitor_pool_size),
        }
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_millis(self.renewal_interval_ms)
    }

    pub fn max_hold(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms)
    }
}
