//! Warehouse movement entity - receipts, issues and stock adjustments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Warehouse movement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_movements")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Item moved
    pub item_id: i64,
    /// `"receipt"`, `"issue"` or `"adjustment"`
    pub movement_type: String,
    /// Quantity moved; adjustments may be negative
    pub quantity: f64,
    /// Unit price at the time of the movement
    pub unit_price: f64,
    /// When the movement was booked
    pub date: DateTime,
}

/// `WarehouseMovement` relationships are resolved in SQL joins
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
