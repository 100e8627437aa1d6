//! Calendar event entity - scheduled workshop appointments. The analytics
//! core only counts them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Calendar event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "calendar_events")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Short title
    pub title: String,
    /// When the appointment starts
    pub start_date: DateTime,
    /// `"scheduled"`, `"done"` or `"cancelled"`
    pub status: String,
}

/// `CalendarEvent` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
