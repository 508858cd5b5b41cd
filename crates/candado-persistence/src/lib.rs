//! Candado Persistence - Database entities and lease store
//!
//! This crate provides:
//! - The `SeaORM` entity for the cluster_mutex table
//! - `DatabaseLeaseStore`, the shared-database implementation of
//!   `candado_lock::LeaseStore`

pub mod entity;
pub mod store;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export the database-backed store
pub use store::DatabaseLeaseStore;
