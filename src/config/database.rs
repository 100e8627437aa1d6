//! Database configuration for the workshop store.
//!
//! The analytics core reads the store through `core::port` and never creates
//! or alters tables. This module exists for hosting applications and tests:
//! it opens a `SeaORM` connection and creates every table the core reads from
//! the entity definitions using `Schema::create_table_from_entity`, so the
//! schema always matches the Rust structs.

use crate::entities::{
    CalendarEvent, Category, Customer, Order, Setting, Supplier, User, WarehouseItem,
    WarehouseMovement, WorkLog,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::debug;

/// Opens a connection to the store at `database_url`
/// (e.g. `sqlite://data/workshop.sqlite` or `sqlite::memory:`).
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to {database_url}");
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all workshop tables from their entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let statements = [
        schema.create_table_from_entity(Customer),
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Order),
        schema.create_table_from_entity(WorkLog),
        schema.create_table_from_entity(Supplier),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(WarehouseItem),
        schema.create_table_from_entity(WarehouseMovement),
        schema.create_table_from_entity(CalendarEvent),
        schema.create_table_from_entity(Setting),
    ];

    for statement in &statements {
        db.execute(builder.build(statement)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OrderModel, SettingModel, WarehouseItemModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_connect_in_memory() -> Result<()> {
        let db = connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<OrderModel> = Order::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<OrderModel> = Order::find().limit(1).all(&db).await?;
        let _: Vec<WarehouseItemModel> = WarehouseItem::find().limit(1).all(&db).await?;
        let _: Vec<SettingModel> = Setting::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_twice_fails() -> Result<()> {
        let db = connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        assert!(create_tables(&db).await.is_err());
        Ok(())
    }
}
