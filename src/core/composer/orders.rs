//! Order views: overview, top orders, problems, customers and vehicles.

use super::{Composer, ViewContext, count_card, money_card, section};
use crate::core::aggregation::{self, OrderDetail, ProblemKind};
use crate::core::domain::OrderStatus;
use crate::core::port::DataAccessPort;
use crate::core::snapshot::{Cell, MetricCard, MetricValue, Section, Series, Table};
use crate::errors::Result;

const ORDER_HEADERS: [&str; 9] = [
    "id",
    "order_number",
    "order_date",
    "order_type",
    "status",
    "total_price",
    "material_cost",
    "vehicle",
    "customer",
];

fn order_cells(order: &OrderDetail) -> Vec<Cell> {
    vec![
        Cell::Integer(order.id),
        Cell::text(order.order_number.as_str()),
        Cell::Date(order.order_date),
        Cell::text(order.order_type.as_str()),
        Cell::opt_text(order.status.map(OrderStatus::as_str)),
        Cell::Money(order.total_price),
        Cell::Money(order.material_cost),
        Cell::opt_text(order.vehicle.as_deref()),
        Cell::opt_text(order.customer.as_deref()),
    ]
}

impl<P: DataAccessPort> Composer<'_, P> {
    pub(super) async fn orders_overview(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("summary", move |s| self.order_cards(ctx, s)).await,
            section("order_trend", move |s| self.order_trend(ctx, s)).await,
            section("by_status", move |s| self.status_table(ctx, s)).await,
            section("by_type", move |s| self.order_types(ctx, s, "orders_by_type")).await,
        ]
    }

    pub(super) async fn orders_top(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("top", move |s| self.top_orders(ctx, s)).await]
    }

    pub(super) async fn orders_problems(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("problems", move |s| self.problem_table(ctx, s)).await]
    }

    pub(super) async fn orders_customers(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("customers", move |s| self.top_customers(ctx, s)).await]
    }

    pub(super) async fn orders_vehicles(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("vehicles", move |s| self.vehicle_table(ctx, s)).await]
    }

    pub(super) async fn order_cards(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = aggregation::orders_summary(self.port, &ctx.period, &ctx.filters).await?;
        let previous = aggregation::orders_summary(self.port, &ctx.previous, &ctx.filters).await?;
        let statuses = aggregation::orders_by_status(self.port, &ctx.period, &ctx.filters).await?;
        let cancelled = statuses
            .iter()
            .find(|entry| entry.status == OrderStatus::Cancelled)
            .map_or(0, |entry| entry.count);

        Ok(section.metrics(vec![
            count_card("orders", current.count, Some(previous.count)),
            money_card("revenue", current.revenue, Some(previous.revenue)),
            money_card("avg_order_value", current.avg_order_value, Some(previous.avg_order_value)),
            MetricCard::new("median_order_value", MetricValue::Money(current.median_order_value)),
            MetricCard::new("cancelled_orders", MetricValue::Count(cancelled)),
        ]))
    }

    async fn order_trend(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        #[allow(clippy::cast_precision_loss)]
        let counts = Series::from_buckets(
            "orders",
            series.iter().map(|point| (&point.bucket, point.count as f64)),
        );
        Ok(section.series(counts))
    }

    pub(super) async fn status_table(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let statuses = aggregation::orders_by_status(self.port, &ctx.period, &ctx.filters).await?;
        let mut table = Table::new("orders_by_status", &["status", "orders"]);
        for entry in statuses {
            table.push(vec![Cell::text(entry.status.as_str()), Cell::count(entry.count)]);
        }
        Ok(section.table(table))
    }

    pub(super) async fn top_orders(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let orders =
            aggregation::top_orders(self.port, &ctx.period, &ctx.filters, self.config.top_limit)
                .await?;
        let mut table = Table::new("top_orders", &ORDER_HEADERS);
        for order in &orders {
            table.push(order_cells(order));
        }
        Ok(section.table(table))
    }

    async fn problem_table(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let problems = aggregation::problem_orders(
            self.port,
            &ctx.period,
            &ctx.filters,
            ctx.as_of,
            self.config.overdue_order_days,
        )
        .await?;

        let mut headers = ORDER_HEADERS.to_vec();
        headers.push("problems");
        let mut table = Table::new("problem_orders", &headers);
        for problem in &problems {
            let mut cells = order_cells(&problem.order);
            let kinds: Vec<&str> = problem.problems.iter().map(|kind| kind.as_str()).collect();
            cells.push(Cell::Text(kinds.join(",")));
            table.push(cells);
        }

        let cards = [
            ProblemKind::Cancelled,
            ProblemKind::Overdue,
            ProblemKind::NegativeMargin,
            ProblemKind::ZeroPrice,
        ]
        .into_iter()
        .map(|kind| {
            let count = problems
                .iter()
                .filter(|problem| problem.problems.contains(&kind))
                .count() as u64;
            MetricCard::new(kind.as_str(), MetricValue::Count(count))
        })
        .collect();

        Ok(section.metrics(cards).table(table))
    }

    async fn vehicle_table(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let vehicles = aggregation::orders_by_vehicle(
            self.port,
            &ctx.period,
            &ctx.filters,
            self.config.top_limit,
        )
        .await?;
        let mut table = Table::new("vehicles", &["vehicle", "orders", "revenue"]);
        for vehicle in vehicles {
            table.push(vec![
                Cell::Text(vehicle.vehicle),
                Cell::count(vehicle.count),
                Cell::Money(vehicle.revenue),
            ]);
        }
        Ok(section.table(table))
    }
}
