//! Utility functions

use uuid::Uuid;

/// Maximum accepted length for a mutex name.
pub const MAX_MUTEX_NAME_LENGTH: usize = 200;

/// Check that a mutex name is usable as a lock key: non-empty, within the
/// length cap, and free of leading/trailing whitespace.
pub fn is_valid_mutex_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_MUTEX_NAME_LENGTH && name.trim() == name
}

/// Identity of this server process for lease ownership records.
///
/// Combines the hostname with a random suffix so two processes on the same
/// machine remain distinguishable in the store.
pub fn local_server_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    let suffix = Uuid::new_v4().simple().to_string();

    format!("{}-{}", host, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_mutex_name() {
        assert!(is_valid_mutex_name("layout-import"));
        assert!(is_valid_mutex_name("PORTAL::purge-raw-events"));
        assert!(!is_valid_mutex_name(""));
        assert!(!is_valid_mutex_name(" padded "));
        assert!(!is_valid_mutex_name(&"x".repeat(MAX_MUTEX_NAME_LENGTH + 1)));
    }

    #[test]
    fn test_local_server_id_is_stable_format() {
        let id = local_server_id();
        assert!(id.contains('-'));
        assert!(!id.is_empty());

        // Two calls must not collide
        assert_ne!(id, local_server_id());
    }
}
