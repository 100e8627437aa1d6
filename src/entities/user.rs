//! User entity - workshop staff. Only `role = "mechanic"` users appear in
//! workload analytics.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub full_name: String,
    /// `"mechanic"`, `"admin"` or `"other"`
    pub role: String,
    /// Inactive users keep their history but are not counted as capacity
    pub active: bool,
}

/// `User` relationships are resolved in SQL joins
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
