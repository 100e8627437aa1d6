//! Aggregation engine.
//!
//! Canonical aggregates over orders, the work log and warehouse movements.
//! Every function issues its registered query through the port and returns a
//! fixed-shape result. Series are bucketed here from day-level rows so every
//! bucket of the requested period is present, with zeros where nothing happened.

use crate::core::domain::{MovementType, OrderStatus, OrderType};
use crate::core::numeric::{self, money_ratio, sum_money};
use crate::core::period::{Bucket, Period};
use crate::core::port::{DataAccessPort, Row};
use crate::core::queries;
use crate::errors::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Optional narrowing of order and work-log aggregates.
///
/// An unknown mechanic id simply matches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Filters {
    /// Only orders of this type
    pub order_type: Option<OrderType>,
    /// Only orders in this status
    pub status: Option<OrderStatus>,
    /// Only orders assigned to or worked on by this mechanic
    pub mechanic_id: Option<i64>,
    /// Count cancelled orders in revenue aggregates
    pub include_cancelled: bool,
}

impl Filters {
    /// Restricts to one order type.
    #[must_use]
    pub const fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    /// Restricts to one status.
    #[must_use]
    pub const fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to one mechanic.
    #[must_use]
    pub const fn mechanic(mut self, mechanic_id: i64) -> Self {
        self.mechanic_id = Some(mechanic_id);
        self
    }

    /// Opts in to cancelled orders.
    #[must_use]
    pub const fn with_cancelled(mut self) -> Self {
        self.include_cancelled = true;
        self
    }

    /// Whether cancelled orders take part. Filtering on the cancelled status
    /// implies it.
    #[must_use]
    pub fn includes_cancelled(&self) -> bool {
        self.include_cancelled || self.status == Some(OrderStatus::Cancelled)
    }
}

/// Totals over all matching orders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrdersSummary {
    /// Number of orders
    pub count: u64,
    /// Sum of `total_price`
    pub revenue: Decimal,
    /// Sum of `material_cost`
    pub material_cost: Decimal,
    /// `revenue / count`, zero without orders
    pub avg_order_value: Decimal,
    /// Lower median of `total_price`
    pub median_order_value: Decimal,
}

/// One bucket of the order series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrdersPoint {
    /// The bucket
    pub bucket: Bucket,
    /// Number of orders
    pub count: u64,
    /// Sum of `total_price`
    pub revenue: Decimal,
    /// Sum of `material_cost`
    pub material_cost: Decimal,
}

/// Orders of one canonical type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeBreakdown {
    /// Order type
    pub order_type: OrderType,
    /// Number of orders
    pub count: u64,
    /// Sum of `total_price`
    pub revenue: Decimal,
    /// Sum of `material_cost`
    pub material_cost: Decimal,
}

/// Orders in one canonical status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    /// Status
    pub status: OrderStatus,
    /// Number of orders
    pub count: u64,
}

/// Totals over the work log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkloadSummary {
    /// Logged hours
    pub total_hours: Decimal,
    /// Mechanics with at least one entry
    pub distinct_mechanics: u64,
    /// Orders with at least one entry
    pub distinct_orders: u64,
}

/// Work log totals of one mechanic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MechanicWorkload {
    /// User id
    pub user_id: i64,
    /// Display name, empty when the user row is missing
    pub full_name: String,
    /// Logged hours
    pub total_hours: Decimal,
    /// Orders worked on
    pub distinct_orders: u64,
}

/// Current stock valuation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockSummary {
    /// Σ quantity × purchase price
    pub total_purchase_value: Decimal,
    /// Σ quantity × sale price
    pub total_sale_value: Decimal,
    /// Number of items
    pub item_count: u64,
    /// Items whose quantity is below their minimum
    pub items_below_min: u64,
}

/// One bucket of one movement type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementPoint {
    /// The bucket
    pub bucket: Bucket,
    /// Movement type
    pub movement_type: MovementType,
    /// Σ quantity, adjustments may be negative
    pub quantity: f64,
    /// Σ quantity × unit price
    pub value: Decimal,
}

/// Stock and movement history of one warehouse item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemHistory {
    /// Item id
    pub item_id: i64,
    /// Item name
    pub name: String,
    /// Category name
    pub category: Option<String>,
    /// Supplier name
    pub supplier: Option<String>,
    /// Quantity on hand
    pub quantity: f64,
    /// Reorder threshold
    pub min_quantity: f64,
    /// Unit purchase price
    pub price_purchase: Decimal,
    /// Unit sale price
    pub price_sale: Decimal,
    /// Quantity issued inside the period
    pub total_issued: f64,
    /// Quantity received inside the period
    pub total_received: f64,
    /// Value of the issues inside the period at movement prices
    pub issued_value: Decimal,
    /// Date of the most recent movement of any kind, ever
    pub last_movement_date: Option<NaiveDate>,
}

/// Why an order shows up in the problem list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// The order was cancelled
    Cancelled,
    /// Still open after the overdue limit
    Overdue,
    /// Material cost exceeds the price
    NegativeMargin,
    /// Completed without a price
    ZeroPrice,
}

impl ProblemKind {
    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Overdue => "overdue",
            Self::NegativeMargin => "negative_margin",
            Self::ZeroPrice => "zero_price",
        }
    }
}

/// A single order with its display fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    /// Order id
    pub id: i64,
    /// Business order number
    pub order_number: String,
    /// Order date
    pub order_date: NaiveDate,
    /// Canonical type
    pub order_type: OrderType,
    /// Canonical status, `None` for unknown stored values
    pub status: Option<OrderStatus>,
    /// Price
    pub total_price: Decimal,
    /// Material cost
    pub material_cost: Decimal,
    /// Vehicle description
    pub vehicle: Option<String>,
    /// Customer name
    pub customer: Option<String>,
}

/// A problem order with every reason it was flagged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemOrder {
    /// The order
    pub order: OrderDetail,
    /// Reasons, in declaration order of [`ProblemKind`]
    pub problems: Vec<ProblemKind>,
}

/// Orders of one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerOrders {
    /// Customer id
    pub customer_id: i64,
    /// Customer name, empty when the row is missing
    pub name: String,
    /// Number of orders
    pub count: u64,
    /// Sum of `total_price`
    pub revenue: Decimal,
    /// Date of the most recent order in the period
    pub last_order_date: Option<NaiveDate>,
}

/// Orders for one vehicle description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleOrders {
    /// Trimmed vehicle description
    pub vehicle: String,
    /// Number of orders
    pub count: u64,
    /// Sum of `total_price`
    pub revenue: Decimal,
}

/// One bucket of a mechanic's hours
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoursPoint {
    /// The bucket
    pub bucket: Bucket,
    /// Logged hours
    pub hours: Decimal,
}

/// Hours series of one mechanic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MechanicHours {
    /// User id
    pub user_id: i64,
    /// One point per bucket of the period
    pub points: Vec<HoursPoint>,
}

/// Hours of one mechanic on one order type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MechanicTypeHours {
    /// User id
    pub user_id: i64,
    /// Order type
    pub order_type: OrderType,
    /// Logged hours
    pub hours: Decimal,
    /// Orders worked on
    pub distinct_orders: u64,
}

/// Revenue of the orders assigned to one mechanic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MechanicRevenue {
    /// User id
    pub user_id: i64,
    /// Number of orders
    pub count: u64,
    /// Sum of `total_price`
    pub revenue: Decimal,
    /// Sum of `material_cost`
    pub material_cost: Decimal,
}

/// A user with the mechanic role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mechanic {
    /// User id
    pub id: i64,
    /// Display name
    pub full_name: String,
    /// Whether the account is active
    pub active: bool,
}

/// Count, revenue, average and lower median of the matching orders.
pub async fn orders_summary<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<OrdersSummary> {
    let rows = port.query(&queries::order_values(period, filters)).await?;

    let mut prices = Vec::with_capacity(rows.len());
    let mut costs = Vec::with_capacity(rows.len());
    for row in &rows {
        prices.push(row.money("total_price")?);
        costs.push(row.money("material_cost")?);
    }
    prices.sort();

    let count = prices.len() as u64;
    let revenue = sum_money(&prices);
    Ok(OrdersSummary {
        count,
        revenue,
        material_cost: sum_money(&costs),
        avg_order_value: money_ratio(revenue, Decimal::from(count)),
        median_order_value: lower_median(&prices),
    })
}

/// Middle element of a sorted sample; the lower one on an even count.
#[must_use]
pub fn lower_median(sorted: &[Decimal]) -> Decimal {
    if sorted.is_empty() {
        return numeric::money(0.0);
    }
    sorted[(sorted.len() - 1) / 2]
}

/// Orders per bucket of the period, every bucket present.
pub async fn orders_series<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<OrdersPoint>> {
    let rows = port.query(&queries::orders_daily(period, filters)).await?;
    let buckets = period.buckets();

    let mut totals = vec![(0u64, Vec::new(), Vec::new()); buckets.len()];
    for row in &rows {
        let Some(index) = bucket_index(&buckets, row.date("day")?) else {
            continue;
        };
        let slot = &mut totals[index];
        slot.0 += row.count("orders")?;
        slot.1.push(row.money("revenue")?);
        slot.2.push(row.money("material_cost")?);
    }

    Ok(buckets
        .into_iter()
        .zip(totals)
        .map(|(bucket, (count, revenue, cost))| OrdersPoint {
            bucket,
            count,
            revenue: sum_money(&revenue),
            material_cost: sum_money(&cost),
        })
        .collect())
}

/// Orders per canonical type, every type present in display order.
pub async fn orders_by_type<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<TypeBreakdown>> {
    let rows = port.query(&queries::orders_by_type(period, filters)).await?;

    let mut breakdown: Vec<TypeBreakdown> = OrderType::ALL
        .iter()
        .map(|order_type| TypeBreakdown {
            order_type: *order_type,
            count: 0,
            revenue: numeric::money(0.0),
            material_cost: numeric::money(0.0),
        })
        .collect();

    for row in &rows {
        let order_type = OrderType::from_storage(&row.text("order_type")?);
        if let Some(entry) = breakdown.iter_mut().find(|e| e.order_type == order_type) {
            entry.count += row.count("orders")?;
            entry.revenue = sum_money(&[entry.revenue, row.money("revenue")?]);
            entry.material_cost = sum_money(&[entry.material_cost, row.money("material_cost")?]);
        }
    }
    Ok(breakdown)
}

/// Order counts per canonical status, cancelled included. Unknown stored
/// statuses are logged and left out.
pub async fn orders_by_status<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<StatusCount>> {
    let rows = port.query(&queries::orders_by_status(period, filters)).await?;

    let mut counts: Vec<StatusCount> = OrderStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: 0,
        })
        .collect();

    for row in &rows {
        let raw = row.text("status")?;
        match OrderStatus::from_storage(&raw) {
            Some(status) => {
                if let Some(entry) = counts.iter_mut().find(|e| e.status == status) {
                    entry.count += row.count("orders")?;
                }
            }
            None => warn!(status = %raw, "ignoring orders with unknown status"),
        }
    }
    Ok(counts)
}

/// Hours, mechanics and orders in the work log.
pub async fn workload_summary<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<WorkloadSummary> {
    let rows = port.query(&queries::workload_summary(period, filters)).await?;
    let Some(row) = rows.first() else {
        return Ok(WorkloadSummary {
            total_hours: numeric::hours(0.0),
            ..WorkloadSummary::default()
        });
    };
    Ok(WorkloadSummary {
        total_hours: row.hours("hours")?,
        distinct_mechanics: row.count("mechanics")?,
        distinct_orders: row.count("orders")?,
    })
}

/// Hours and orders per mechanic, by user id.
pub async fn workload_by_mechanic<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<MechanicWorkload>> {
    let rows = port.query(&queries::workload_by_mechanic(period, filters)).await?;
    rows.iter()
        .map(|row| {
            Ok(MechanicWorkload {
                user_id: row.integer("user_id")?,
                full_name: row.text("full_name")?,
                total_hours: row.hours("hours")?,
                distinct_orders: row.count("orders")?,
            })
        })
        .collect()
}

/// Warehouse valuation at current prices.
pub async fn stock_summary<P: DataAccessPort>(port: &P) -> Result<StockSummary> {
    let rows = port.query(&queries::stock_summary()).await?;
    let Some(row) = rows.first() else {
        return Ok(StockSummary {
            total_purchase_value: numeric::money(0.0),
            total_sale_value: numeric::money(0.0),
            ..StockSummary::default()
        });
    };
    Ok(StockSummary {
        total_purchase_value: row.money("purchase_value")?,
        total_sale_value: row.money("sale_value")?,
        item_count: row.count("items")?,
        items_below_min: row.count("below_min")?,
    })
}

/// Movements per bucket and movement type: one point for every bucket of
/// every type, buckets outer, types in display order inner.
pub async fn stock_movements_series<P: DataAccessPort>(
    port: &P,
    period: &Period,
    item_id: Option<i64>,
) -> Result<Vec<MovementPoint>> {
    let rows = port.query(&queries::movements_daily(period, item_id)).await?;
    let buckets = period.buckets();
    let types = MovementType::ALL;

    let mut totals = vec![(0.0f64, Vec::new()); buckets.len() * types.len()];
    for row in &rows {
        let raw = row.text("movement_type")?;
        let Some(movement_type) = MovementType::from_storage(&raw) else {
            warn!(movement_type = %raw, "ignoring movements with unknown type");
            continue;
        };
        let Some(index) = bucket_index(&buckets, row.date("day")?) else {
            continue;
        };
        let type_index = types.iter().position(|t| *t == movement_type).unwrap_or(0);
        let slot = &mut totals[index * types.len() + type_index];
        slot.0 += row.real("quantity")?;
        slot.1.push(row.money("value")?);
    }

    let mut points = Vec::with_capacity(totals.len());
    for (index, bucket) in buckets.iter().enumerate() {
        for (type_index, movement_type) in types.iter().enumerate() {
            let (quantity, values) = &totals[index * types.len() + type_index];
            points.push(MovementPoint {
                bucket: bucket.clone(),
                movement_type: *movement_type,
                quantity: numeric::round_to(*quantity, 3),
                value: sum_money(values),
            });
        }
    }
    Ok(points)
}

/// Issues, receipts and last movement of every item (or of one item).
pub async fn item_issue_history<P: DataAccessPort>(
    port: &P,
    period: &Period,
    item_id: Option<i64>,
) -> Result<Vec<ItemHistory>> {
    let rows = port.query(&queries::item_history(period, item_id)).await?;
    rows.iter()
        .map(|row| {
            Ok(ItemHistory {
                item_id: row.integer("item_id")?,
                name: row.text("name")?,
                category: row.opt_text("category")?,
                supplier: row.opt_text("supplier")?,
                quantity: row.real("quantity")?,
                min_quantity: row.real("min_quantity")?,
                price_purchase: row.money("price_purchase")?,
                price_sale: row.money("price_sale")?,
                total_issued: row.real("issued")?,
                total_received: row.real("received")?,
                issued_value: row.money("issued_value")?,
                last_movement_date: row.opt_date("last_movement")?,
            })
        })
        .collect()
}

fn order_detail(row: &Row) -> Result<OrderDetail> {
    Ok(OrderDetail {
        id: row.integer("id")?,
        order_number: row.text("order_number")?,
        order_date: row.date("order_date")?,
        order_type: OrderType::from_storage(&row.text("order_type")?),
        status: OrderStatus::from_storage(&row.text("status")?),
        total_price: row.money("total_price")?,
        material_cost: row.money("material_cost")?,
        vehicle: row.opt_text("vehicle")?,
        customer: row.opt_text("customer")?,
    })
}

/// The `limit` highest-priced orders, ties by id.
pub async fn top_orders<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
    limit: i64,
) -> Result<Vec<OrderDetail>> {
    let rows = port.query(&queries::top_orders(period, filters, limit)).await?;
    rows.iter().map(order_detail).collect()
}

/// Orders needing attention, oldest first.
///
/// # Arguments
/// * `today` - Reference date for staleness
/// * `overdue_days` - Open orders older than this are overdue
pub async fn problem_orders<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
    today: NaiveDate,
    overdue_days: i64,
) -> Result<Vec<ProblemOrder>> {
    let overdue_before = crate::core::period::shift_days(today, -overdue_days);
    let rows = port
        .query(&queries::problem_orders(period, filters, overdue_before))
        .await?;

    let mut problems = Vec::with_capacity(rows.len());
    for row in &rows {
        let order = order_detail(row)?;
        let kinds = classify_problems(&order, overdue_before);
        if !kinds.is_empty() {
            problems.push(ProblemOrder {
                order,
                problems: kinds,
            });
        }
    }
    Ok(problems)
}

/// Every problem an order has, in declaration order.
#[must_use]
pub fn classify_problems(order: &OrderDetail, overdue_before: NaiveDate) -> Vec<ProblemKind> {
    let mut kinds = Vec::new();
    if order.status == Some(OrderStatus::Cancelled) {
        kinds.push(ProblemKind::Cancelled);
    }
    if matches!(
        order.status,
        Some(OrderStatus::New | OrderStatus::InProgress)
    ) && order.order_date < overdue_before
    {
        kinds.push(ProblemKind::Overdue);
    }
    if order.material_cost > order.total_price {
        kinds.push(ProblemKind::NegativeMargin);
    }
    if order.status == Some(OrderStatus::Completed) && order.total_price.is_zero() {
        kinds.push(ProblemKind::ZeroPrice);
    }
    kinds
}

/// Customers ranked by revenue.
pub async fn orders_by_customer<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
    limit: i64,
) -> Result<Vec<CustomerOrders>> {
    let rows = port
        .query(&queries::orders_by_customer(period, filters, limit))
        .await?;
    rows.iter()
        .map(|row| {
            Ok(CustomerOrders {
                customer_id: row.integer("customer_id")?,
                name: row.text("name")?,
                count: row.count("orders")?,
                revenue: row.money("revenue")?,
                last_order_date: row.opt_date("last_order")?,
            })
        })
        .collect()
}

/// Vehicles ranked by order count.
pub async fn orders_by_vehicle<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
    limit: i64,
) -> Result<Vec<VehicleOrders>> {
    let rows = port
        .query(&queries::orders_by_vehicle(period, filters, limit))
        .await?;
    rows.iter()
        .map(|row| {
            Ok(VehicleOrders {
                vehicle: row.text("vehicle")?,
                count: row.count("orders")?,
                revenue: row.money("revenue")?,
            })
        })
        .collect()
}

/// Hours per mechanic per bucket; mechanics without entries are absent,
/// present mechanics have every bucket.
pub async fn hours_series<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<MechanicHours>> {
    let rows = port.query(&queries::hours_daily(period, filters)).await?;
    let buckets = period.buckets();

    let mut per_mechanic: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for row in &rows {
        let Some(index) = bucket_index(&buckets, row.date("day")?) else {
            continue;
        };
        let slots = per_mechanic
            .entry(row.integer("user_id")?)
            .or_insert_with(|| vec![0.0; buckets.len()]);
        slots[index] += row.real("hours")?;
    }

    Ok(per_mechanic
        .into_iter()
        .map(|(user_id, slots)| MechanicHours {
            user_id,
            points: buckets
                .iter()
                .zip(slots)
                .map(|(bucket, hours)| HoursPoint {
                    bucket: bucket.clone(),
                    hours: numeric::hours(hours),
                })
                .collect(),
        })
        .collect())
}

/// Hours per mechanic and order type.
pub async fn hours_by_mechanic_and_type<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<MechanicTypeHours>> {
    let rows = port
        .query(&queries::hours_by_mechanic_and_type(period, filters))
        .await?;
    rows.iter()
        .map(|row| {
            Ok(MechanicTypeHours {
                user_id: row.integer("user_id")?,
                order_type: OrderType::from_storage(&row.text("order_type")?),
                hours: row.hours("hours")?,
                distinct_orders: row.count("orders")?,
            })
        })
        .collect()
}

/// Order revenue per assigned mechanic.
pub async fn mechanic_revenue<P: DataAccessPort>(
    port: &P,
    period: &Period,
    filters: &Filters,
) -> Result<Vec<MechanicRevenue>> {
    let rows = port.query(&queries::mechanic_revenue(period, filters)).await?;
    rows.iter()
        .map(|row| {
            Ok(MechanicRevenue {
                user_id: row.integer("user_id")?,
                count: row.count("orders")?,
                revenue: row.money("revenue")?,
                material_cost: row.money("material_cost")?,
            })
        })
        .collect()
}

/// Users with the mechanic role.
pub async fn mechanics<P: DataAccessPort>(port: &P, mechanic_id: Option<i64>) -> Result<Vec<Mechanic>> {
    let rows = port.query(&queries::mechanics(mechanic_id)).await?;
    rows.iter()
        .map(|row| {
            Ok(Mechanic {
                id: row.integer("id")?,
                full_name: row.text("full_name")?,
                active: row.integer("active")? != 0,
            })
        })
        .collect()
}

/// Calendar events scheduled in the period.
pub async fn scheduled_events<P: DataAccessPort>(port: &P, period: &Period) -> Result<u64> {
    let rows = port.query(&queries::scheduled_events(period)).await?;
    rows.first().map_or(Ok(0), |row| row.count("events"))
}

fn bucket_index(buckets: &[Bucket], date: NaiveDate) -> Option<usize> {
    let index = buckets.partition_point(|bucket| bucket.start <= date);
    let index = index.checked_sub(1)?;
    (buckets[index].end >= date).then_some(index)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::period::Granularity;
    use crate::core::port::SeaOrmPort;
    use crate::test_utils::{self, date, setup_test_db};

    fn period(from: NaiveDate, to: NaiveDate, granularity: Granularity) -> Period {
        Period::new(from, to, granularity).unwrap()
    }

    async fn seeded_port() -> Result<SeaOrmPort> {
        let db = setup_test_db().await?;
        test_utils::seed_workshop(&db).await?;
        Ok(SeaOrmPort::new(db))
    }

    #[test]
    fn test_lower_median() {
        let values: Vec<Decimal> = [1.0, 2.0, 3.0, 4.0].iter().map(|v| numeric::money(*v)).collect();
        assert_eq!(lower_median(&values), numeric::money(2.0));
        assert_eq!(lower_median(&values[..3]), numeric::money(2.0));
        assert_eq!(lower_median(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_filters_cancelled_status_implies_opt_in() {
        assert!(!Filters::default().includes_cancelled());
        assert!(Filters::default().status(OrderStatus::Cancelled).includes_cancelled());
    }

    #[test]
    fn test_bucket_index_bounds() {
        let p = period(date(2024, 1, 15), date(2024, 3, 10), Granularity::Month);
        let buckets = p.buckets();
        assert_eq!(bucket_index(&buckets, date(2024, 1, 15)), Some(0));
        assert_eq!(bucket_index(&buckets, date(2024, 2, 29)), Some(1));
        assert_eq!(bucket_index(&buckets, date(2024, 3, 10)), Some(2));
        assert_eq!(bucket_index(&buckets, date(2024, 1, 14)), None);
        assert_eq!(bucket_index(&buckets, date(2024, 3, 11)), None);
    }

    #[tokio::test]
    async fn test_orders_summary_excludes_cancelled() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);

        let summary = orders_summary(&port, &march, &Filters::default()).await?;
        // Seed: 3 live March orders (1000, 2500, 4000) and one cancelled (9000)
        assert_eq!(summary.count, 3);
        assert_eq!(summary.revenue.to_string(), "7500.00");
        assert_eq!(summary.avg_order_value.to_string(), "2500.00");
        assert_eq!(summary.median_order_value.to_string(), "2500.00");

        let with_cancelled =
            orders_summary(&port, &march, &Filters::default().with_cancelled()).await?;
        assert_eq!(with_cancelled.count, 4);
        assert_eq!(with_cancelled.revenue.to_string(), "16500.00");
        Ok(())
    }

    #[tokio::test]
    async fn test_orders_series_has_every_bucket() -> Result<()> {
        let port = seeded_port().await?;
        let range = period(date(2024, 1, 1), date(2024, 6, 30), Granularity::Month);

        let series = orders_series(&port, &range, &Filters::default()).await?;
        assert_eq!(series.len(), 6);
        assert_eq!(series[0].bucket.key, "2024-01");
        // No orders in January
        assert_eq!(series[0].count, 0);
        assert_eq!(series[0].revenue.to_string(), "0.00");
        assert_eq!(series[2].count, 3);

        let weekly = orders_series(
            &port,
            &range.with_granularity(Granularity::Week),
            &Filters::default(),
        )
        .await?;
        assert_eq!(weekly.len(), range.with_granularity(Granularity::Week).buckets().len());
        Ok(())
    }

    #[tokio::test]
    async fn test_orders_by_status_maps_legacy_labels() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);

        let statuses = orders_by_status(&port, &march, &Filters::default()).await?;
        let count = |status| {
            statuses
                .iter()
                .find(|entry| entry.status == status)
                .map_or(0, |entry| entry.count)
        };
        // The cancelled order is stored as "Zrušeno"
        assert_eq!(count(OrderStatus::Cancelled), 1);
        assert_eq!(count(OrderStatus::Completed), 2);
        assert_eq!(count(OrderStatus::InProgress), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_orders_by_type_fixed_shape() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);

        let types = orders_by_type(&port, &march, &Filters::default()).await?;
        assert_eq!(types.len(), OrderType::ALL.len());
        let repair = types.iter().find(|t| t.order_type == OrderType::Repair).unwrap();
        assert_eq!(repair.count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_mechanic_yields_empty_results() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);
        let filters = Filters::default().mechanic(999);

        let summary = orders_summary(&port, &march, &filters).await?;
        assert_eq!(summary.count, 0);
        assert_eq!(summary.revenue, Decimal::ZERO);

        let workload = workload_by_mechanic(&port, &march, &filters).await?;
        assert!(workload.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_workload_aggregates() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);

        let summary = workload_summary(&port, &march, &Filters::default()).await?;
        assert_eq!(summary.total_hours.to_string(), "14.5");
        assert_eq!(summary.distinct_mechanics, 2);

        let by_mechanic = workload_by_mechanic(&port, &march, &Filters::default()).await?;
        assert_eq!(by_mechanic.len(), 2);
        assert_eq!(by_mechanic[0].full_name, "Jan Novák");
        assert_eq!(by_mechanic[0].total_hours.to_string(), "10.0");

        let series = hours_series(
            &port,
            &march.with_granularity(Granularity::Week),
            &Filters::default(),
        )
        .await?;
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|m| m.points.len() == march.with_granularity(Granularity::Week).buckets().len()));
        Ok(())
    }

    #[tokio::test]
    async fn test_stock_summary_and_history() -> Result<()> {
        let port = seeded_port().await?;
        let summary = stock_summary(&port).await?;
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.items_below_min, 1);

        let lookback = period(date(2024, 1, 1), date(2024, 3, 31), Granularity::Month);
        let history = item_issue_history(&port, &lookback, None).await?;
        assert_eq!(history.len(), 3);
        let oil = &history[0];
        assert_eq!(oil.total_issued, 10.0);
        assert_eq!(oil.total_received, 20.0);
        assert_eq!(oil.last_movement_date, Some(date(2024, 3, 20)));
        // The idle item never moved
        assert_eq!(history[2].last_movement_date, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_movement_series_shape() -> Result<()> {
        let port = seeded_port().await?;
        let range = period(date(2024, 1, 1), date(2024, 3, 31), Granularity::Month);

        let points = stock_movements_series(&port, &range, None).await?;
        assert_eq!(points.len(), 3 * MovementType::ALL.len());
        let march_issues = points
            .iter()
            .find(|p| p.bucket.key == "2024-03" && p.movement_type == MovementType::Issue)
            .unwrap();
        assert_eq!(march_issues.quantity, 10.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_problem_orders_classified() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);

        let problems =
            problem_orders(&port, &march, &Filters::default(), date(2024, 4, 30), 14).await?;
        let kinds: Vec<ProblemKind> = problems.iter().flat_map(|p| p.problems.clone()).collect();
        assert!(kinds.contains(&ProblemKind::Cancelled));
        assert!(kinds.contains(&ProblemKind::Overdue));
        Ok(())
    }

    #[test]
    fn test_classify_negative_margin_and_zero_price() {
        let order = OrderDetail {
            id: 1,
            order_number: "Z-1".to_string(),
            order_date: date(2024, 3, 1),
            order_type: OrderType::Repair,
            status: Some(OrderStatus::Completed),
            total_price: Decimal::ZERO,
            material_cost: numeric::money(100.0),
            vehicle: None,
            customer: None,
        };
        assert_eq!(
            classify_problems(&order, date(2024, 2, 1)),
            vec![ProblemKind::NegativeMargin, ProblemKind::ZeroPrice]
        );
    }

    #[tokio::test]
    async fn test_rankings() -> Result<()> {
        let port = seeded_port().await?;
        let march = period(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day);

        let top = top_orders(&port, &march, &Filters::default(), 2).await?;
        assert_eq!(top.len(), 2);
        assert!(top[0].total_price >= top[1].total_price);

        let customers = orders_by_customer(&port, &march, &Filters::default(), 10).await?;
        assert!(!customers.is_empty());
        assert!(customers.windows(2).all(|w| w[0].revenue >= w[1].revenue));

        let vehicles = orders_by_vehicle(&port, &march, &Filters::default(), 10).await?;
        assert_eq!(vehicles[0].vehicle, "Škoda Octavia");

        let mechanics = mechanics(&port, None).await?;
        assert_eq!(mechanics.len(), 2);

        assert_eq!(scheduled_events(&port, &march).await?, 1);
        Ok(())
    }
}
