//! `SeaORM` entity definitions

pub mod cluster_mutex;

pub mod prelude {
    pub use super::cluster_mutex::Entity as ClusterMutex;
}
