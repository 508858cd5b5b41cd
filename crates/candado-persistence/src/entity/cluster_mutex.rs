//! `SeaORM` Entity for cluster_mutex table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "cluster_mutex")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Mutex name; the unique index on this column is what makes `acquire`
    /// atomic across the cluster
    #[sea_orm(unique)]
    pub name: String,
    pub server_id: String,
    pub locked_at: i64,
    pub last_renewed_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
