//! Work log entity - hours a mechanic spent on an order on a given day.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Work log database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_work_log")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order the work belongs to
    pub order_id: i64,
    /// Mechanic (user) who did the work
    pub user_id: i64,
    /// Day of the work
    pub date: Date,
    /// Hours spent, never negative
    pub hours_worked: Option<f64>,
    /// Optional note
    pub description: Option<String>,
}

/// Defines relationships between a work log entry and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
