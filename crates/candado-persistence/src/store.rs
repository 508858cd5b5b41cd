//! Database-backed lease store
//!
//! The `cluster_mutex` table is the cluster-wide arbiter: one row per held
//! lease, a unique index on the mutex name, and row presence meaning "held".
//! Acquisition is a plain INSERT so the database's own uniqueness guarantee
//! provides the acquire-iff-free atomicity; this store never reads-then-writes
//! a lease outside of these single-statement operations.

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{prelude::Expr, *};
use tracing::warn;

use candado_common::{CandadoError, local_server_id};
use candado_lock::model::ClusterMutex;
use candado_lock::store::LeaseStore;

use crate::entity::cluster_mutex;

/// Lease store over a shared MySQL/PostgreSQL database.
pub struct DatabaseLeaseStore {
    db: DatabaseConnection,
    server_id: String,
    lease_timeout_ms: Option<i64>,
}

impl DatabaseLeaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            server_id: local_server_id(),
            lease_timeout_ms: None,
        }
    }

    /// Identity recorded on lease rows owned by this process.
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = server_id.into();
        self
    }

    /// Reclaim lease rows on acquire once their last heartbeat is older than
    /// `timeout` (a crashed holder never releases; its row must not pin the
    /// name forever).
    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout_ms = Some(timeout.as_millis() as i64);
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn try_insert(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>> {
        let lease = ClusterMutex::new(name, &self.server_id);
        let row = cluster_mutex::ActiveModel {
            name: Set(lease.name.clone()),
            server_id: Set(lease.server_id.clone()),
            locked_at: Set(lease.locked_at),
            last_renewed_at: Set(lease.last_renewed_at),
            ..Default::default()
        };

        match cluster_mutex::Entity::insert(row).exec(&self.db).await {
            Ok(_) => Ok(Some(lease)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the row for `name` iff its heartbeat is older than the lease
    /// timeout. The timestamp filter keeps the delete atomic with respect to
    /// a concurrent renewal by a live holder.
    async fn reclaim_abandoned(&self, name: &str) -> anyhow::Result<bool> {
        let Some(timeout) = self.lease_timeout_ms else {
            return Ok(false);
        };
        let cutoff = chrono::Utc::now().timestamp_millis() - timeout;

        let result = cluster_mutex::Entity::delete_many()
            .filter(cluster_mutex::Column::Name.eq(name))
            .filter(cluster_mutex::Column::LastRenewedAt.lte(cutoff))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl LeaseStore for DatabaseLeaseStore {
    async fn acquire(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>> {
        if let Some(lease) = self.try_insert(name).await? {
            return Ok(Some(lease));
        }

        // The name is held. If its holder stopped heartbeating long ago,
        // reclaim the row and retry the insert once; losing that race to
        // another node is ordinary contention.
        if self.reclaim_abandoned(name).await? {
            warn!("reclaimed abandoned lease row for '{}'", name);
            return self.try_insert(name).await;
        }

        Ok(None)
    }

    async fn renew(&self, name: &str) -> anyhow::Result<()> {
        let result = cluster_mutex::Entity::update_many()
            .col_expr(
                cluster_mutex::Column::LastRenewedAt,
                Expr::value(chrono::Utc::now().timestamp_millis()),
            )
            .filter(cluster_mutex::Column::Name.eq(name))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(CandadoError::LeaseLost(name.to_string()).into());
        }
        Ok(())
    }

    async fn release(&self, name: &str) -> anyhow::Result<()> {
        cluster_mutex::Entity::delete_many()
            .filter(cluster_mutex::Column::Name.eq(name))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn read(&self, name: &str) -> anyhow::Result<Option<ClusterMutex>> {
        let row = cluster_mutex::Entity::find()
            .filter(cluster_mutex::Column::Name.eq(name))
            .one(&self.db)
            .await?;
        Ok(row.map(ClusterMutex::from))
    }
}

impl From<cluster_mutex::Model> for ClusterMutex {
    fn from(model: cluster_mutex::Model) -> Self {
        ClusterMutex {
            name: model.name,
            server_id: model.server_id,
            locked_at: model.locked_at,
            last_renewed_at: model.last_renewed_at,
        }
    }
}
