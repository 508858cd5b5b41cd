//! Candado Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all Candado
//! components:
//! - Error types
//! - Mutex-name validation
//! - Server/node identity

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::CandadoError;
pub use utils::{MAX_MUTEX_NAME_LENGTH, is_valid_mutex_name, local_server_id};
