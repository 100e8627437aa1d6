//! Query registry - every SQL statement the analytics core issues.
//!
//! One constructor per aggregate returns a [`Query`] with its SQL, bound
//! parameters and row descriptor. Legacy status, type and movement spellings
//! are normalized here through the `CASE` expressions from `core::domain`,
//! so aggregates only ever see canonical keys.
//!
//! Parameter layout shared by all order queries:
//! `?1` from, `?2` to, `?3` include cancelled (0/1), `?4` order type,
//! `?5` status, `?6` mechanic id. Work log queries use `?1` from, `?2` to,
//! `?3` mechanic id, `?4` order type.

use crate::core::aggregation::Filters;
use crate::core::domain::{MovementType, OrderStatus, OrderType};
use crate::core::period::Period;
use crate::core::port::{Column, Query, RowDescriptor, SqlValue};
use chrono::NaiveDate;

fn status_sql() -> String {
    format!("COALESCE({}, '')", OrderStatus::sql_canonical("o.status"))
}

fn type_sql() -> String {
    OrderType::sql_canonical("o.order_type")
}

fn movement_sql() -> String {
    MovementType::sql_canonical("m.movement_type")
}

fn order_where() -> String {
    let status = status_sql();
    let order_type = type_sql();
    format!(
        "date(o.order_date) BETWEEN ?1 AND ?2 \
         AND (?3 = 1 OR {status} <> 'cancelled') \
         AND (?4 IS NULL OR {order_type} = ?4) \
         AND (?5 IS NULL OR {status} = ?5) \
         AND (?6 IS NULL OR o.assigned_mechanic_id = ?6 \
              OR EXISTS (SELECT 1 FROM order_work_log fw WHERE fw.order_id = o.id AND fw.user_id = ?6))"
    )
}

fn order_params(period: &Period, filters: &Filters) -> Vec<SqlValue> {
    vec![
        SqlValue::date(period.from()),
        SqlValue::date(period.to()),
        SqlValue::from(filters.includes_cancelled()),
        SqlValue::opt_text(filters.order_type.map(OrderType::as_str)),
        SqlValue::opt_text(filters.status.map(OrderStatus::as_str)),
        SqlValue::opt_integer(filters.mechanic_id),
    ]
}

fn work_where() -> String {
    let order_type = type_sql();
    format!(
        "date(w.date) BETWEEN ?1 AND ?2 \
         AND (?3 IS NULL OR w.user_id = ?3) \
         AND (?4 IS NULL OR {order_type} = ?4)"
    )
}

fn work_params(period: &Period, filters: &Filters) -> Vec<SqlValue> {
    vec![
        SqlValue::date(period.from()),
        SqlValue::date(period.to()),
        SqlValue::opt_integer(filters.mechanic_id),
        SqlValue::opt_text(filters.order_type.map(OrderType::as_str)),
    ]
}

const REVENUE_SUMS: &str = "CAST(COALESCE(SUM(COALESCE(o.total_price, 0)), 0) AS REAL) AS revenue, \
     CAST(COALESCE(SUM(COALESCE(o.material_cost, 0)), 0) AS REAL) AS material_cost";

/// Row of `order_values`
pub const ORDER_VALUE_COLUMNS: RowDescriptor =
    &[Column::real("total_price"), Column::real("material_cost")];

/// Every order's price and material cost, sorted by price (for the median).
#[must_use]
pub fn order_values(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "order_values",
        sql: format!(
            "SELECT CAST(COALESCE(o.total_price, 0) AS REAL) AS total_price, \
                    CAST(COALESCE(o.material_cost, 0) AS REAL) AS material_cost \
             FROM orders o WHERE {} \
             ORDER BY 1, o.id",
            order_where()
        ),
        params: order_params(period, filters),
        columns: ORDER_VALUE_COLUMNS,
    }
}

/// Row of `orders_daily`
pub const ORDERS_DAILY_COLUMNS: RowDescriptor = &[
    Column::text("day"),
    Column::integer("orders"),
    Column::real("revenue"),
    Column::real("material_cost"),
];

/// Orders grouped by day; bucketing happens in the aggregation engine.
#[must_use]
pub fn orders_daily(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "orders_daily",
        sql: format!(
            "SELECT date(o.order_date) AS day, COUNT(*) AS orders, {REVENUE_SUMS} \
             FROM orders o WHERE {} \
             GROUP BY date(o.order_date) ORDER BY day",
            order_where()
        ),
        params: order_params(period, filters),
        columns: ORDERS_DAILY_COLUMNS,
    }
}

/// Row of `orders_by_type`
pub const ORDERS_BY_TYPE_COLUMNS: RowDescriptor = &[
    Column::text("order_type"),
    Column::integer("orders"),
    Column::real("revenue"),
    Column::real("material_cost"),
];

/// Orders grouped by canonical order type.
#[must_use]
pub fn orders_by_type(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "orders_by_type",
        sql: format!(
            "SELECT {} AS order_type, COUNT(*) AS orders, {REVENUE_SUMS} \
             FROM orders o WHERE {} \
             GROUP BY 1 ORDER BY 1",
            type_sql(),
            order_where()
        ),
        params: order_params(period, filters),
        columns: ORDERS_BY_TYPE_COLUMNS,
    }
}

/// Row of `orders_by_status`
pub const ORDERS_BY_STATUS_COLUMNS: RowDescriptor =
    &[Column::text("status"), Column::integer("orders")];

/// Order counts per canonical status, cancelled always included.
#[must_use]
pub fn orders_by_status(period: &Period, filters: &Filters) -> Query {
    let filters = filters.with_cancelled();
    Query {
        name: "orders_by_status",
        sql: format!(
            "SELECT {} AS status, COUNT(*) AS orders \
             FROM orders o WHERE {} \
             GROUP BY 1 ORDER BY 1",
            status_sql(),
            order_where()
        ),
        params: order_params(period, &filters),
        columns: ORDERS_BY_STATUS_COLUMNS,
    }
}

/// Row of `top_orders` and `problem_orders`
pub const ORDER_DETAIL_COLUMNS: RowDescriptor = &[
    Column::integer("id"),
    Column::text("order_number"),
    Column::text("order_date"),
    Column::text("order_type"),
    Column::text("status"),
    Column::real("total_price"),
    Column::real("material_cost"),
    Column::text("vehicle"),
    Column::text("customer"),
];

fn order_detail_select() -> String {
    format!(
        "SELECT o.id, o.order_number, date(o.order_date) AS order_date, {} AS order_type, \
                {} AS status, CAST(COALESCE(o.total_price, 0) AS REAL) AS total_price, \
                CAST(COALESCE(o.material_cost, 0) AS REAL) AS material_cost, \
                o.vehicle, c.name AS customer \
         FROM orders o LEFT JOIN customers c ON c.id = o.customer_id",
        type_sql(),
        status_sql()
    )
}

/// Highest-value orders of the period.
#[must_use]
pub fn top_orders(period: &Period, filters: &Filters, limit: i64) -> Query {
    let mut params = order_params(period, filters);
    params.push(SqlValue::Integer(limit));
    Query {
        name: "top_orders",
        sql: format!(
            "{} WHERE {} ORDER BY 6 DESC, o.id LIMIT ?7",
            order_detail_select(),
            order_where()
        ),
        params,
        columns: ORDER_DETAIL_COLUMNS,
    }
}

/// Orders that are cancelled, stale, loss-making or unpriced. Orders opened
/// before `overdue_before` and still open count as stale.
#[must_use]
pub fn problem_orders(period: &Period, filters: &Filters, overdue_before: NaiveDate) -> Query {
    let filters = filters.with_cancelled();
    let mut params = order_params(period, &filters);
    params.push(SqlValue::date(overdue_before));
    let status = status_sql();
    Query {
        name: "problem_orders",
        sql: format!(
            "{} WHERE {} AND ( \
                 {status} = 'cancelled' \
                 OR ({status} IN ('new', 'in_progress') AND date(o.order_date) < ?7) \
                 OR COALESCE(o.material_cost, 0) > COALESCE(o.total_price, 0) \
                 OR ({status} = 'completed' AND COALESCE(o.total_price, 0) = 0)) \
             ORDER BY date(o.order_date), o.id",
            order_detail_select(),
            order_where()
        ),
        params,
        columns: ORDER_DETAIL_COLUMNS,
    }
}

/// Row of `orders_by_customer`
pub const ORDERS_BY_CUSTOMER_COLUMNS: RowDescriptor = &[
    Column::integer("customer_id"),
    Column::text("name"),
    Column::integer("orders"),
    Column::real("revenue"),
    Column::text("last_order"),
];

/// Customers ranked by revenue in the period.
#[must_use]
pub fn orders_by_customer(period: &Period, filters: &Filters, limit: i64) -> Query {
    let mut params = order_params(period, filters);
    params.push(SqlValue::Integer(limit));
    Query {
        name: "orders_by_customer",
        sql: format!(
            "SELECT o.customer_id, c.name, COUNT(*) AS orders, \
                    CAST(COALESCE(SUM(COALESCE(o.total_price, 0)), 0) AS REAL) AS revenue, \
                    MAX(date(o.order_date)) AS last_order \
             FROM orders o LEFT JOIN customers c ON c.id = o.customer_id \
             WHERE {} AND o.customer_id IS NOT NULL \
             GROUP BY o.customer_id, c.name \
             ORDER BY 4 DESC, 1 LIMIT ?7",
            order_where()
        ),
        params,
        columns: ORDERS_BY_CUSTOMER_COLUMNS,
    }
}

/// Row of `orders_by_vehicle`
pub const ORDERS_BY_VEHICLE_COLUMNS: RowDescriptor = &[
    Column::text("vehicle"),
    Column::integer("orders"),
    Column::real("revenue"),
];

/// Vehicle descriptions ranked by order count in the period.
#[must_use]
pub fn orders_by_vehicle(period: &Period, filters: &Filters, limit: i64) -> Query {
    let mut params = order_params(period, filters);
    params.push(SqlValue::Integer(limit));
    Query {
        name: "orders_by_vehicle",
        sql: format!(
            "SELECT TRIM(o.vehicle) AS vehicle, COUNT(*) AS orders, \
                    CAST(COALESCE(SUM(COALESCE(o.total_price, 0)), 0) AS REAL) AS revenue \
             FROM orders o \
             WHERE {} AND o.vehicle IS NOT NULL AND TRIM(o.vehicle) <> '' \
             GROUP BY TRIM(o.vehicle) \
             ORDER BY 2 DESC, 3 DESC, 1 LIMIT ?7",
            order_where()
        ),
        params,
        columns: ORDERS_BY_VEHICLE_COLUMNS,
    }
}

/// Row of `mechanic_revenue`
pub const MECHANIC_REVENUE_COLUMNS: RowDescriptor = &[
    Column::integer("user_id"),
    Column::integer("orders"),
    Column::real("revenue"),
    Column::real("material_cost"),
];

/// Orders and revenue per assigned mechanic.
#[must_use]
pub fn mechanic_revenue(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "mechanic_revenue",
        sql: format!(
            "SELECT o.assigned_mechanic_id AS user_id, COUNT(*) AS orders, {REVENUE_SUMS} \
             FROM orders o WHERE {} AND o.assigned_mechanic_id IS NOT NULL \
             GROUP BY 1 ORDER BY 1",
            order_where()
        ),
        params: order_params(period, filters),
        columns: MECHANIC_REVENUE_COLUMNS,
    }
}

const HOURS_SUM: &str = "CAST(COALESCE(SUM(COALESCE(w.hours_worked, 0)), 0) AS REAL)";

/// Row of `workload_summary`
pub const WORKLOAD_SUMMARY_COLUMNS: RowDescriptor = &[
    Column::real("hours"),
    Column::integer("mechanics"),
    Column::integer("orders"),
];

/// Total hours, distinct mechanics and distinct orders in the work log.
#[must_use]
pub fn workload_summary(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "workload_summary",
        sql: format!(
            "SELECT {HOURS_SUM} AS hours, COUNT(DISTINCT w.user_id) AS mechanics, \
                    COUNT(DISTINCT w.order_id) AS orders \
             FROM order_work_log w LEFT JOIN orders o ON o.id = w.order_id \
             WHERE {}",
            work_where()
        ),
        params: work_params(period, filters),
        columns: WORKLOAD_SUMMARY_COLUMNS,
    }
}

/// Row of `workload_by_mechanic`
pub const WORKLOAD_BY_MECHANIC_COLUMNS: RowDescriptor = &[
    Column::integer("user_id"),
    Column::text("full_name"),
    Column::real("hours"),
    Column::integer("orders"),
];

/// Hours and distinct orders per mechanic.
#[must_use]
pub fn workload_by_mechanic(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "workload_by_mechanic",
        sql: format!(
            "SELECT w.user_id, u.full_name, {HOURS_SUM} AS hours, \
                    COUNT(DISTINCT w.order_id) AS orders \
             FROM order_work_log w \
             LEFT JOIN users u ON u.id = w.user_id \
             LEFT JOIN orders o ON o.id = w.order_id \
             WHERE {} \
             GROUP BY w.user_id, u.full_name ORDER BY w.user_id",
            work_where()
        ),
        params: work_params(period, filters),
        columns: WORKLOAD_BY_MECHANIC_COLUMNS,
    }
}

/// Row of `hours_daily`
pub const HOURS_DAILY_COLUMNS: RowDescriptor = &[
    Column::integer("user_id"),
    Column::text("day"),
    Column::real("hours"),
];

/// Hours per mechanic per day.
#[must_use]
pub fn hours_daily(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "hours_daily",
        sql: format!(
            "SELECT w.user_id, date(w.date) AS day, {HOURS_SUM} AS hours \
             FROM order_work_log w LEFT JOIN orders o ON o.id = w.order_id \
             WHERE {} \
             GROUP BY w.user_id, date(w.date) ORDER BY 2, 1",
            work_where()
        ),
        params: work_params(period, filters),
        columns: HOURS_DAILY_COLUMNS,
    }
}

/// Row of `hours_by_mechanic_and_type`
pub const HOURS_BY_TYPE_COLUMNS: RowDescriptor = &[
    Column::integer("user_id"),
    Column::text("order_type"),
    Column::real("hours"),
    Column::integer("orders"),
];

/// Hours per mechanic and canonical order type.
#[must_use]
pub fn hours_by_mechanic_and_type(period: &Period, filters: &Filters) -> Query {
    Query {
        name: "hours_by_mechanic_and_type",
        sql: format!(
            "SELECT w.user_id, {} AS order_type, {HOURS_SUM} AS hours, \
                    COUNT(DISTINCT w.order_id) AS orders \
             FROM order_work_log w LEFT JOIN orders o ON o.id = w.order_id \
             WHERE {} \
             GROUP BY 1, 2 ORDER BY 1, 2",
            type_sql(),
            work_where()
        ),
        params: work_params(period, filters),
        columns: HOURS_BY_TYPE_COLUMNS,
    }
}

/// Row of `mechanics`
pub const MECHANICS_COLUMNS: RowDescriptor = &[
    Column::integer("id"),
    Column::text("full_name"),
    Column::integer("active"),
];

/// Users with the mechanic role, optionally a single one.
#[must_use]
pub fn mechanics(mechanic_id: Option<i64>) -> Query {
    Query {
        name: "mechanics",
        sql: "SELECT u.id, u.full_name, CAST(u.active AS INTEGER) AS active \
              FROM users u \
              WHERE LOWER(TRIM(u.role)) = 'mechanic' AND (?1 IS NULL OR u.id = ?1) \
              ORDER BY u.id"
            .to_string(),
        params: vec![SqlValue::opt_integer(mechanic_id)],
        columns: MECHANICS_COLUMNS,
    }
}

/// Row of `stock_summary`
pub const STOCK_SUMMARY_COLUMNS: RowDescriptor = &[
    Column::real("purchase_value"),
    Column::real("sale_value"),
    Column::integer("items"),
    Column::integer("below_min"),
];

/// Current stock valuation over the whole warehouse.
#[must_use]
pub fn stock_summary() -> Query {
    Query {
        name: "stock_summary",
        sql: "SELECT CAST(COALESCE(SUM(COALESCE(quantity, 0) * COALESCE(price_purchase, 0)), 0) AS REAL) AS purchase_value, \
                     CAST(COALESCE(SUM(COALESCE(quantity, 0) * COALESCE(price_sale, 0)), 0) AS REAL) AS sale_value, \
                     COUNT(*) AS items, \
                     COALESCE(SUM(CASE WHEN COALESCE(quantity, 0) < COALESCE(min_quantity, 0) THEN 1 ELSE 0 END), 0) AS below_min \
              FROM warehouse"
            .to_string(),
        params: vec![],
        columns: STOCK_SUMMARY_COLUMNS,
    }
}

/// Row of `movements_daily`
pub const MOVEMENTS_DAILY_COLUMNS: RowDescriptor = &[
    Column::text("day"),
    Column::text("movement_type"),
    Column::real("quantity"),
    Column::real("value"),
];

/// Movement quantity and value per day and canonical movement type.
#[must_use]
pub fn movements_daily(period: &Period, item_id: Option<i64>) -> Query {
    Query {
        name: "movements_daily",
        sql: format!(
            "SELECT date(m.date) AS day, {} AS movement_type, \
                    CAST(COALESCE(SUM(m.quantity), 0) AS REAL) AS quantity, \
                    CAST(COALESCE(SUM(m.quantity * COALESCE(m.unit_price, 0)), 0) AS REAL) AS value \
             FROM warehouse_movements m \
             WHERE date(m.date) BETWEEN ?1 AND ?2 AND (?3 IS NULL OR m.item_id = ?3) \
             GROUP BY 1, 2 ORDER BY 1, 2",
            movement_sql()
        ),
        params: vec![
            SqlValue::date(period.from()),
            SqlValue::date(period.to()),
            SqlValue::opt_integer(item_id),
        ],
        columns: MOVEMENTS_DAILY_COLUMNS,
    }
}

/// Row of `item_history`
pub const ITEM_HISTORY_COLUMNS: RowDescriptor = &[
    Column::integer("item_id"),
    Column::text("name"),
    Column::text("category"),
    Column::text("supplier"),
    Column::real("quantity"),
    Column::real("min_quantity"),
    Column::real("price_purchase"),
    Column::real("price_sale"),
    Column::real("issued"),
    Column::real("received"),
    Column::real("issued_value"),
    Column::text("last_movement"),
];

/// Every warehouse item with its issues and receipts inside the period and
/// its last movement date over all time.
#[must_use]
pub fn item_history(period: &Period, item_id: Option<i64>) -> Query {
    let movement = movement_sql();
    let in_period = "date(m.date) BETWEEN ?1 AND ?2";
    Query {
        name: "item_history",
        sql: format!(
            "SELECT w.id AS item_id, w.name, c.name AS category, s.name AS supplier, \
                    CAST(COALESCE(w.quantity, 0) AS REAL) AS quantity, \
                    CAST(COALESCE(w.min_quantity, 0) AS REAL) AS min_quantity, \
                    CAST(COALESCE(w.price_purchase, 0) AS REAL) AS price_purchase, \
                    CAST(COALESCE(w.price_sale, 0) AS REAL) AS price_sale, \
                    CAST(COALESCE(SUM(CASE WHEN {movement} = 'issue' AND {in_period} THEN m.quantity ELSE 0 END), 0) AS REAL) AS issued, \
                    CAST(COALESCE(SUM(CASE WHEN {movement} = 'receipt' AND {in_period} THEN m.quantity ELSE 0 END), 0) AS REAL) AS received, \
                    CAST(COALESCE(SUM(CASE WHEN {movement} = 'issue' AND {in_period} THEN m.quantity * COALESCE(m.unit_price, 0) ELSE 0 END), 0) AS REAL) AS issued_value, \
                    MAX(date(m.date)) AS last_movement \
             FROM warehouse w \
             LEFT JOIN warehouse_categories c ON c.id = w.category_id \
             LEFT JOIN warehouse_suppliers s ON s.id = w.supplier_id \
             LEFT JOIN warehouse_movements m ON m.item_id = w.id \
             WHERE (?3 IS NULL OR w.id = ?3) \
             GROUP BY w.id, w.name, c.name, s.name, w.quantity, w.min_quantity, w.price_purchase, w.price_sale \
             ORDER BY w.id"
        ),
        params: vec![
            SqlValue::date(period.from()),
            SqlValue::date(period.to()),
            SqlValue::opt_integer(item_id),
        ],
        columns: ITEM_HISTORY_COLUMNS,
    }
}

/// Row of `scheduled_events`
pub const SCHEDULED_EVENTS_COLUMNS: RowDescriptor = &[Column::integer("events")];

/// Calendar appointments in the period that were not cancelled.
#[must_use]
pub fn scheduled_events(period: &Period) -> Query {
    Query {
        name: "scheduled_events",
        sql: "SELECT COUNT(*) AS events FROM calendar_events e \
              WHERE date(e.start_date) BETWEEN ?1 AND ?2 \
              AND LOWER(COALESCE(e.status, '')) <> 'cancelled'"
            .to_string(),
        params: vec![SqlValue::date(period.from()), SqlValue::date(period.to())],
        columns: SCHEDULED_EVENTS_COLUMNS,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::period::Granularity;
    use crate::test_utils::date;

    fn march() -> Period {
        Period::new(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day).unwrap()
    }

    fn max_placeholder(sql: &str) -> usize {
        sql.split('?')
            .skip(1)
            .filter_map(|rest| {
                let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_parameter_counts_match_placeholders() {
        let period = march();
        let filters = Filters::default();
        let cutoff = period.from();
        let queries = [
            order_values(&period, &filters),
            orders_daily(&period, &filters),
            orders_by_type(&period, &filters),
            orders_by_status(&period, &filters),
            top_orders(&period, &filters, 5),
            problem_orders(&period, &filters, cutoff),
            orders_by_customer(&period, &filters, 5),
            orders_by_vehicle(&period, &filters, 5),
            mechanic_revenue(&period, &filters),
            workload_summary(&period, &filters),
            workload_by_mechanic(&period, &filters),
            hours_daily(&period, &filters),
            hours_by_mechanic_and_type(&period, &filters),
            mechanics(None),
            stock_summary(),
            movements_daily(&period, None),
            item_history(&period, None),
            scheduled_events(&period),
        ];

        for query in &queries {
            assert_eq!(
                max_placeholder(&query.sql),
                query.params.len(),
                "placeholder mismatch in {}",
                query.name
            );
        }
    }

    #[test]
    fn test_status_query_always_includes_cancelled() {
        let query = orders_by_status(&march(), &Filters::default());
        assert_eq!(query.params[2], SqlValue::Integer(1));
    }

    #[test]
    fn test_filters_are_bound_as_canonical_keys() {
        let filters = Filters::default()
            .order_type(OrderType::Repair)
            .mechanic(4);
        let query = orders_daily(&march(), &filters);
        assert_eq!(query.params[3], SqlValue::Text("repair".to_string()));
        assert_eq!(query.params[4], SqlValue::Null);
        assert_eq!(query.params[5], SqlValue::Integer(4));
    }
}
