//! Order entity - one service job or sale in the workshop.
//!
//! Money columns are nullable in legacy rows; the analytics queries coalesce
//! them to zero. `status` and `order_type` may hold legacy spellings, see
//! `core::domain` for the canonical mapping.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-facing order number (e.g. "2024-0153")
    pub order_number: String,
    /// Day the order was opened
    pub order_date: Date,
    /// Day the order was finished, if it was
    pub completion_date: Option<Date>,
    /// Kind of job: service, repair, inspection, sale, other
    pub order_type: String,
    /// Lifecycle state: new, `in_progress`, completed, cancelled
    pub status: String,
    /// Price charged to the customer
    pub total_price: Option<f64>,
    /// Purchase cost of parts consumed by the order
    pub material_cost: Option<f64>,
    /// Customer the order belongs to
    pub customer_id: Option<i64>,
    /// Free-text vehicle description ("Škoda Octavia 1.9 TDI")
    pub vehicle: Option<String>,
    /// Mechanic responsible for the order
    pub assigned_mechanic_id: Option<i64>,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many work log entries
    #[sea_orm(has_many = "super::work_log::Entity")]
    WorkLog,
}

impl Related<super::work_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
