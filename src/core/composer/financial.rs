//! Financial views: overview, revenue, costs, profitability and trends.

use super::{Composer, ViewContext, count_card, money_card, percent_card, section, type_table};
use crate::core::aggregation::{self, OrdersPoint};
use crate::core::finance::{self, FinancialBreakdown};
use crate::core::numeric::{self, round_to};
use crate::core::period::Period;
use crate::core::port::DataAccessPort;
use crate::core::snapshot::{Cell, MetricCard, MetricValue, Section, Series, Table};
use crate::core::targets::TargetKey;
use crate::core::trends::{growth_curve, moving_average, naive_projection};
use crate::errors::Result;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

impl<P: DataAccessPort> Composer<'_, P> {
    pub(super) async fn financial_overview(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("summary", move |s| self.profit_summary(ctx, s)).await,
            section("revenue_trend", move |s| self.revenue_trend(ctx, s)).await,
            section("order_types", move |s| self.order_types(ctx, s, "order_types")).await,
        ]
    }

    pub(super) async fn financial_revenue(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("revenue", move |s| self.revenue_cards(ctx, s)).await,
            section("revenue_trend", move |s| self.revenue_with_average(ctx, s)).await,
            section("by_type", move |s| self.order_types(ctx, s, "revenue_by_type")).await,
            section("customers", move |s| self.top_customers(ctx, s)).await,
        ]
    }

    pub(super) async fn financial_costs(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("costs", move |s| self.cost_cards(ctx, s)).await,
            section("cost_trend", move |s| self.cost_trend(ctx, s)).await,
            section("by_type", move |s| self.cost_by_type(ctx, s)).await,
        ]
    }

    pub(super) async fn financial_profitability(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("profit", move |s| self.profit_summary(ctx, s)).await,
            section("by_type", move |s| self.profit_by_type(ctx, s)).await,
            section("by_mechanic", move |s| self.profit_by_mechanic(ctx, s)).await,
        ]
    }

    pub(super) async fn financial_trends(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("growth", move |s| self.revenue_growth(ctx, s)).await,
            section("moving_average", move |s| self.revenue_with_average(ctx, s)).await,
            section("forecast", move |s| self.revenue_forecast(ctx, s)).await,
        ]
    }

    /// Profit breakdown of `period`, labor at the hourly rate target.
    pub(super) async fn breakdown(
        &self,
        ctx: &ViewContext,
        period: &Period,
    ) -> Result<FinancialBreakdown> {
        let summary = aggregation::orders_summary(self.port, period, &ctx.filters).await?;
        let workload = aggregation::workload_summary(self.port, period, &ctx.filters).await?;
        Ok(finance::financial_breakdown(
            &summary,
            workload.total_hours,
            ctx.targets.get(TargetKey::HourlyRateDefault),
        ))
    }

    pub(super) async fn profit_summary(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = self.breakdown(ctx, &ctx.period).await?;
        let previous = self.breakdown(ctx, &ctx.previous).await?;
        Ok(section.metrics(breakdown_cards(&current, Some(&previous))))
    }

    async fn revenue_trend(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        Ok(section
            .series(money_series("revenue", &series, |p| p.revenue))
            .series(money_series("material_cost", &series, |p| p.material_cost))
            .series(money_series("gross_profit", &series, |p| p.revenue - p.material_cost)))
    }

    pub(super) async fn order_types(
        &self,
        ctx: &ViewContext,
        section: Section,
        name: &str,
    ) -> Result<Section> {
        let breakdown = aggregation::orders_by_type(self.port, &ctx.period, &ctx.filters).await?;
        Ok(section.table(type_table(name, &breakdown)))
    }

    async fn revenue_cards(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = aggregation::orders_summary(self.port, &ctx.period, &ctx.filters).await?;
        let previous = aggregation::orders_summary(self.port, &ctx.previous, &ctx.filters).await?;
        Ok(section.metrics(vec![
            money_card("revenue", current.revenue, Some(previous.revenue)),
            count_card("orders", current.count, Some(previous.count)),
            money_card("avg_order_value", current.avg_order_value, Some(previous.avg_order_value)),
            money_card(
                "median_order_value",
                current.median_order_value,
                Some(previous.median_order_value),
            ),
        ]))
    }

    async fn revenue_with_average(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        let revenue = money_series("revenue", &series, |p| p.revenue);
        let averaged = moving_average(&revenue.values(), self.config.moving_average_window);
        let average = Series::from_buckets(
            "revenue_moving_average",
            series.iter().map(|p| &p.bucket).zip(averaged),
        );
        Ok(section.series(revenue).series(average))
    }

    pub(super) async fn top_customers(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let customers = aggregation::orders_by_customer(
            self.port,
            &ctx.period,
            &ctx.filters,
            self.config.top_limit,
        )
        .await?;
        let mut table = Table::new(
            "top_customers",
            &["customer_id", "name", "orders", "revenue", "last_order_date"],
        );
        for customer in customers {
            table.push(vec![
                Cell::Integer(customer.customer_id),
                Cell::Text(customer.name),
                Cell::count(customer.count),
                Cell::Money(customer.revenue),
                Cell::opt_date(customer.last_order_date),
            ]);
        }
        Ok(section.table(table))
    }

    async fn cost_cards(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = self.breakdown(ctx, &ctx.period).await?;
        let previous = self.breakdown(ctx, &ctx.previous).await?;
        let total = current.material_cost + current.labor_cost;
        let cost_ratio = numeric::ratio(numeric::to_f64(total), numeric::to_f64(current.revenue));
        Ok(section.metrics(vec![
            money_card("material_cost", current.material_cost, Some(previous.material_cost)),
            money_card("labor_cost", current.labor_cost, Some(previous.labor_cost)),
            money_card(
                "total_cost",
                total,
                Some(previous.material_cost + previous.labor_cost),
            ),
            MetricCard::new("labor_hours", MetricValue::Hours(current.labor_hours)),
            MetricCard::new("hourly_rate", MetricValue::Money(current.hourly_rate)),
            percent_card("cost_ratio", round_to(cost_ratio * 100.0, 1)),
        ]))
    }

    async fn cost_trend(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        let hours = aggregation::hours_series(self.port, &ctx.period, &ctx.filters).await?;
        let rate = ctx.targets.get(TargetKey::HourlyRateDefault);

        let mut labor = vec![Decimal::ZERO; series.len()];
        for mechanic in &hours {
            for (slot, point) in labor.iter_mut().zip(&mechanic.points) {
                *slot += point.hours * rate;
            }
        }

        let labor_series = Series::from_buckets(
            "labor_cost",
            series
                .iter()
                .map(|p| &p.bucket)
                .zip(labor.into_iter().map(|cost| round_to(numeric::to_f64(cost), 2))),
        );
        Ok(section
            .series(money_series("material_cost", &series, |p| p.material_cost))
            .series(labor_series))
    }

    async fn cost_by_type(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let breakdown = aggregation::orders_by_type(self.port, &ctx.period, &ctx.filters).await?;
        let total: Decimal = breakdown.iter().map(|entry| entry.material_cost).sum();
        let mut table = Table::new(
            "cost_by_type",
            &["order_type", "orders", "material_cost", "share_pct"],
        );
        for entry in &breakdown {
            let share = numeric::ratio(
                numeric::to_f64(entry.material_cost),
                numeric::to_f64(total),
            );
            table.push(vec![
                Cell::text(entry.order_type.as_str()),
                Cell::count(entry.count),
                Cell::Money(entry.material_cost),
                Cell::Percent(round_to(share * 100.0, 1)),
            ]);
        }
        Ok(section.table(table))
    }

    async fn profit_by_type(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let breakdown = aggregation::orders_by_type(self.port, &ctx.period, &ctx.filters).await?;
        let mut table = Table::new(
            "profit_by_type",
            &["order_type", "revenue", "material_cost", "gross_profit", "margin_pct"],
        );
        for entry in &breakdown {
            let profit = entry.revenue - entry.material_cost;
            table.push(vec![
                Cell::text(entry.order_type.as_str()),
                Cell::Money(entry.revenue),
                Cell::Money(entry.material_cost),
                Cell::Money(profit),
                Cell::opt_percent(finance::margin_pct(profit, entry.revenue)),
            ]);
        }
        Ok(section.table(table))
    }

    async fn profit_by_mechanic(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let revenue = aggregation::mechanic_revenue(self.port, &ctx.period, &ctx.filters).await?;
        let workload =
            aggregation::workload_by_mechanic(self.port, &ctx.period, &ctx.filters).await?;
        let names: BTreeMap<i64, String> = aggregation::mechanics(self.port, None)
            .await?
            .into_iter()
            .map(|mechanic| (mechanic.id, mechanic.full_name))
            .collect();

        let mut table = Table::new(
            "profit_by_mechanic",
            &[
                "user_id",
                "full_name",
                "orders",
                "revenue",
                "gross_profit",
                "margin_pct",
                "revenue_per_hour",
            ],
        );
        for entry in revenue {
            let profit = entry.revenue - entry.material_cost;
            let hours = workload
                .iter()
                .find(|w| w.user_id == entry.user_id)
                .map_or(Decimal::ZERO, |w| w.total_hours);
            table.push(vec![
                Cell::Integer(entry.user_id),
                Cell::opt_text(names.get(&entry.user_id).map(String::as_str)),
                Cell::count(entry.count),
                Cell::Money(entry.revenue),
                Cell::Money(profit),
                Cell::opt_percent(finance::margin_pct(profit, entry.revenue)),
                Cell::Money(numeric::money_ratio(entry.revenue, hours)),
            ]);
        }
        Ok(section.table(table))
    }

    async fn revenue_growth(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        let observations: Vec<(String, f64)> = series
            .iter()
            .map(|p| (p.bucket.key.clone(), numeric::to_f64(p.revenue)))
            .collect();
        let growth = growth_curve(&observations);

        let mut table = Table::new(
            "revenue_growth",
            &["bucket", "revenue", "growth_pct", "cumulative"],
        );
        for point in &growth {
            table.push(vec![
                Cell::text(point.key.as_str()),
                Cell::Number(point.value),
                Cell::opt_percent(point.growth_pct),
                Cell::Number(point.cumulative),
            ]);
        }

        let cumulative = Series::from_buckets(
            "cumulative_revenue",
            series.iter().map(|p| &p.bucket).zip(growth.iter().map(|g| g.cumulative)),
        );

        let mut cards = Vec::new();
        if let [.., previous, current] = observations.as_slice() {
            cards.push(MetricCard::new(
                "naive_next_period",
                MetricValue::Money(numeric::money(naive_projection(current.1, previous.1))),
            ));
        }

        Ok(section
            .metrics(cards)
            .series(money_series("revenue", &series, |p| p.revenue))
            .series(cumulative)
            .table(table))
    }

    async fn revenue_forecast(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        let history: Vec<f64> = series.iter().map(|p| numeric::to_f64(p.revenue)).collect();
        Ok(self.forecast_blocks(ctx, section, "revenue", &history, None))
    }
}

/// Money series over the buckets of an orders series.
pub(super) fn money_series<F>(name: &str, series: &[OrdersPoint], value: F) -> Series
where
    F: Fn(&OrdersPoint) -> Decimal,
{
    Series::from_buckets(
        name,
        series
            .iter()
            .map(|point| (&point.bucket, round_to(numeric::to_f64(value(point)), 2))),
    )
}

/// Headline cards of a profit breakdown, trends against `previous`.
pub(super) fn breakdown_cards(
    current: &FinancialBreakdown,
    previous: Option<&FinancialBreakdown>,
) -> Vec<MetricCard> {
    let mut cards = vec![
        money_card("revenue", current.revenue, previous.map(|p| p.revenue)),
        money_card("material_cost", current.material_cost, previous.map(|p| p.material_cost)),
        money_card("labor_cost", current.labor_cost, previous.map(|p| p.labor_cost)),
        money_card("gross_profit", current.gross_profit, previous.map(|p| p.gross_profit)),
        money_card("net_profit", current.net_profit, previous.map(|p| p.net_profit)),
    ];
    if let Some(margin) = current.gross_margin_pct {
        cards.push(percent_card("gross_margin", margin));
    }
    if let Some(margin) = current.net_margin_pct {
        cards.push(percent_card("net_margin", margin));
    }
    cards
}
