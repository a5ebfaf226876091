//! Activity log rows written by the event bus listener.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "system_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Event name, e.g. `ModuleApproved` or `JobFailed`.
    pub event_type: String,
    /// `info`, `success`, `warn` or `error`.
    pub level: String,
    pub message: String,
    /// The serialized event payload.
    pub details: Option<String>,
    /// RFC 3339 UTC, so string order is time order.
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
