//! Warehouse item entity - a stocked part or consumable.
//!
//! `price_sale` may be below `price_purchase`; such items are flagged by the
//! margin analysis, not rejected.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Warehouse item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Item name
    pub name: String,
    /// Quantity on hand
    pub quantity: f64,
    /// Reorder threshold
    pub min_quantity: f64,
    /// Unit purchase price
    pub price_purchase: f64,
    /// Unit sale price
    pub price_sale: f64,
    /// Supplier, if known
    pub supplier_id: Option<i64>,
    /// Category, if assigned
    pub category_id: Option<i64>,
    /// Shelf location
    pub location: Option<String>,
}

/// `WarehouseItem` relationships are resolved in SQL joins
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
