//! Shared test utilities for the analytics core.
//!
//! This module provides an in-memory store, fixture builders with sensible
//! defaults and a small seeded workshop dataset that the aggregate and
//! composer tests assert against.

use crate::{
    core::port::{DataAccessPort, Query, Row},
    entities::{
        calendar_event, category, customer, order, supplier, user, warehouse_item,
        warehouse_movement, work_log,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Calendar date shorthand for tests.
///
/// # Panics
/// Panics on an impossible date.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[allow(clippy::unwrap_used)]
fn at_ten(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(10, 0, 0).unwrap()
}

/// Fields of a test order; everything not listed defaults to a live repair.
#[derive(Debug, Clone)]
pub struct OrderFixture {
    /// Order date
    pub date: NaiveDate,
    /// Stored type, canonical or legacy
    pub order_type: &'static str,
    /// Stored status, canonical or legacy
    pub status: &'static str,
    /// Price
    pub total_price: f64,
    /// Material cost
    pub material_cost: f64,
    /// Customer
    pub customer_id: Option<i64>,
    /// Vehicle description
    pub vehicle: Option<&'static str>,
    /// Assigned mechanic
    pub mechanic_id: Option<i64>,
}

impl OrderFixture {
    /// A completed repair with the given date and price.
    #[must_use]
    pub const fn new(date: NaiveDate, total_price: f64) -> Self {
        Self {
            date,
            order_type: "repair",
            status: "completed",
            total_price,
            material_cost: 0.0,
            customer_id: None,
            vehicle: None,
            mechanic_id: None,
        }
    }
}

/// Inserts an order and returns its id.
pub async fn create_order(db: &DatabaseConnection, number: &str, fixture: OrderFixture) -> Result<i64> {
    let model = order::ActiveModel {
        order_number: Set(number.to_string()),
        order_date: Set(fixture.date),
        completion_date: Set(None),
        order_type: Set(fixture.order_type.to_string()),
        status: Set(fixture.status.to_string()),
        total_price: Set(Some(fixture.total_price)),
        material_cost: Set(Some(fixture.material_cost)),
        customer_id: Set(fixture.customer_id),
        vehicle: Set(fixture.vehicle.map(str::to_string)),
        assigned_mechanic_id: Set(fixture.mechanic_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

/// Inserts a user and returns its id.
pub async fn create_user(db: &DatabaseConnection, full_name: &str, role: &str) -> Result<i64> {
    let model = user::ActiveModel {
        full_name: Set(full_name.to_string()),
        role: Set(role.to_string()),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

/// Inserts a customer and returns its id.
pub async fn create_customer(db: &DatabaseConnection, name: &str) -> Result<i64> {
    let model = customer::ActiveModel {
        name: Set(name.to_string()),
        phone: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

/// Inserts a work log entry.
pub async fn log_work(
    db: &DatabaseConnection,
    order_id: i64,
    user_id: i64,
    day: NaiveDate,
    hours: f64,
) -> Result<()> {
    work_log::ActiveModel {
        order_id: Set(order_id),
        user_id: Set(user_id),
        date: Set(day),
        hours_worked: Set(Some(hours)),
        description: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Inserts a warehouse item and returns its id.
///
/// # Arguments
/// * `stock` - `(quantity, min_quantity)`
/// * `prices` - `(price_purchase, price_sale)`
pub async fn create_item(
    db: &DatabaseConnection,
    name: &str,
    stock: (f64, f64),
    prices: (f64, f64),
) -> Result<i64> {
    let model = warehouse_item::ActiveModel {
        name: Set(name.to_string()),
        quantity: Set(stock.0),
        min_quantity: Set(stock.1),
        price_purchase: Set(prices.0),
        price_sale: Set(prices.1),
        supplier_id: Set(None),
        category_id: Set(None),
        location: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

/// Inserts a warehouse movement dated 10:00 on `day`.
pub async fn create_movement(
    db: &DatabaseConnection,
    item_id: i64,
    movement_type: &str,
    quantity: f64,
    unit_price: f64,
    day: NaiveDate,
) -> Result<()> {
    warehouse_movement::ActiveModel {
        item_id: Set(item_id),
        movement_type: Set(movement_type.to_string()),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        date: Set(at_ten(day)),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Inserts a calendar event.
pub async fn create_event(db: &DatabaseConnection, title: &str, day: NaiveDate, status: &str) -> Result<()> {
    calendar_event::ActiveModel {
        title: Set(title.to_string()),
        start_date: Set(at_ten(day)),
        status: Set(status.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Seeds a small workshop.
///
/// March 2024: orders of 1000 (repair, completed), 2500 (`Oprava`,
/// `Dokončeno`), 4000 (service, in progress) and a cancelled 9000
/// (`Zrušeno`). Two 2023 orders for year comparisons. Mechanics Jan Novák
/// (10.0 h) and Petr Svoboda (4.5 h). Items: oil (15 on hand, 10 issued in
/// March), brake pads below minimum with a negative margin, and a wiper that
/// never moved.
pub async fn seed_workshop(db: &DatabaseConnection) -> Result<()> {
    let jan = create_user(db, "Jan Novák", "mechanic").await?;
    let petr = create_user(db, "Petr Svoboda", "mechanic").await?;
    create_user(db, "Admin", "admin").await?;

    let dvorak = create_customer(db, "Auto Dvořák").await?;
    let cerna = create_customer(db, "Marie Černá").await?;

    let first = create_order(
        db,
        "Z-2024-001",
        OrderFixture {
            material_cost: 300.0,
            customer_id: Some(dvorak),
            vehicle: Some("Škoda Octavia"),
            mechanic_id: Some(jan),
            ..OrderFixture::new(date(2024, 3, 4), 1000.0)
        },
    )
    .await?;
    let second = create_order(
        db,
        "Z-2024-002",
        OrderFixture {
            order_type: "Oprava",
            status: "Dokončeno",
            material_cost: 800.0,
            customer_id: Some(cerna),
            vehicle: Some("Škoda Octavia"),
            mechanic_id: Some(petr),
            ..OrderFixture::new(date(2024, 3, 11), 2500.0)
        },
    )
    .await?;
    let third = create_order(
        db,
        "Z-2024-003",
        OrderFixture {
            order_type: "service",
            status: "in_progress",
            material_cost: 1200.0,
            customer_id: Some(dvorak),
            vehicle: Some(" Ford Focus "),
            mechanic_id: Some(jan),
            ..OrderFixture::new(date(2024, 3, 18), 4000.0)
        },
    )
    .await?;
    create_order(
        db,
        "Z-2024-004",
        OrderFixture {
            order_type: "service",
            status: "Zrušeno",
            customer_id: Some(cerna),
            ..OrderFixture::new(date(2024, 3, 20), 9000.0)
        },
    )
    .await?;
    create_order(
        db,
        "Z-2023-101",
        OrderFixture {
            order_type: "service",
            ..OrderFixture::new(date(2023, 3, 15), 2000.0)
        },
    )
    .await?;
    create_order(
        db,
        "Z-2023-102",
        OrderFixture {
            order_type: "STK",
            ..OrderFixture::new(date(2023, 11, 10), 1500.0)
        },
    )
    .await?;

    log_work(db, first, jan, date(2024, 3, 4), 4.0).await?;
    log_work(db, third, jan, date(2024, 3, 18), 6.0).await?;
    log_work(db, second, petr, date(2024, 3, 11), 4.5).await?;

    let supplier = supplier::ActiveModel {
        name: Set("Autodíly Praha".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    let category = category::ActiveModel {
        name: Set("Oleje".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let oil = warehouse_item::ActiveModel {
        name: Set("Motorový olej 5W-30".to_string()),
        quantity: Set(15.0),
        min_quantity: Set(5.0),
        price_purchase: Set(200.0),
        price_sale: Set(280.0),
        supplier_id: Set(Some(supplier.id)),
        category_id: Set(Some(category.id)),
        location: Set(Some("A1".to_string())),
        ..Default::default()
    }
    .insert(db)
    .await?
    .id;
    let pads = create_item(db, "Brzdové destičky", (2.0, 4.0), (500.0, 450.0)).await?;
    create_item(db, "Stěrač", (5.0, 0.0), (100.0, 150.0)).await?;

    create_movement(db, oil, "příjem", 20.0, 200.0, date(2024, 1, 10)).await?;
    create_movement(db, oil, "issue", 6.0, 200.0, date(2024, 3, 5)).await?;
    create_movement(db, oil, "výdej", 4.0, 200.0, date(2024, 3, 20)).await?;
    create_movement(db, pads, "issue", 3.0, 500.0, date(2023, 6, 1)).await?;

    create_event(db, "Servis Octavia", date(2024, 3, 12), "scheduled").await?;
    create_event(db, "STK Focus", date(2024, 3, 25), "cancelled").await?;

    Ok(())
}

/// Port wrapper that fails every query whose registry name is listed and
/// delegates the rest.
#[derive(Debug)]
pub struct FailingPort<P> {
    inner: P,
    failing: Vec<&'static str>,
}

impl<P> FailingPort<P> {
    /// Wraps `inner`, failing the named queries.
    pub fn new(inner: P, failing: &[&'static str]) -> Self {
        Self {
            inner,
            failing: failing.to_vec(),
        }
    }
}

impl<P: DataAccessPort> DataAccessPort for FailingPort<P> {
    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        if self.failing.contains(&query.name) {
            return Err(Error::Storage {
                message: format!("injected failure in {}", query.name),
            });
        }
        self.inner.query(query).await
    }
}
