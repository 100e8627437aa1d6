//! Dashboard, KPI view and periodic management reports.

use super::financial::{breakdown_cards, money_series};
use super::{
    Composer, ViewContext, count_card, hours_card, kpi_alerts, kpi_table, money_card,
    percent_card, section,
};
use crate::core::aggregation;
use crate::core::numeric;
use crate::core::period::Granularity;
use crate::core::port::DataAccessPort;
use crate::core::report::ReportKind;
use crate::core::snapshot::{Cell, Section, Series, Table};
use crate::core::targets::TargetKey;
use crate::errors::Result;
use tracing::debug;

impl<P: DataAccessPort> Composer<'_, P> {
    pub(super) async fn dashboard(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("overview", move |s| self.dashboard_cards(ctx, s)).await,
            section("revenue_trend", move |s| self.dashboard_trend(ctx, s, None)).await,
            section("order_types", move |s| self.order_types(ctx, s, "order_types")).await,
            section("stock", move |s| self.stock_cards(ctx, s)).await,
            section("kpi", move |s| self.kpi_section(ctx, s)).await,
        ]
    }

    pub(super) async fn kpi_view(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("kpi", move |s| self.kpi_section(ctx, s)).await,
            section("targets", move |s| async move { Ok(target_table(ctx, s)) }).await,
        ]
    }

    /// Management report over the view period. Sections without data are
    /// left empty and dropped later by the document builder.
    pub(super) async fn report(&self, ctx: &ViewContext, kind: ReportKind) -> Vec<Section> {
        debug!(report = kind.as_str(), period = %ctx.period.label(), "building report");
        let trend = match kind {
            ReportKind::Monthly => Some(Granularity::Week),
            ReportKind::Quarterly | ReportKind::Yearly => Some(Granularity::Month),
            ReportKind::Custom => None,
        };
        vec![
            section("summary", move |s| self.report_summary(ctx, s)).await,
            section("orders", move |s| self.report_orders(ctx, s)).await,
            section("mechanics", move |s| self.workload_table(ctx, s)).await,
            section("warehouse", move |s| self.report_warehouse(ctx, s)).await,
            section("kpi", move |s| self.kpi_section(ctx, s)).await,
            section("trend", move |s| self.dashboard_trend(ctx, s, trend)).await,
        ]
    }

    async fn dashboard_cards(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = aggregation::orders_summary(self.port, &ctx.period, &ctx.filters).await?;
        let previous = aggregation::orders_summary(self.port, &ctx.previous, &ctx.filters).await?;
        let profit = self.breakdown(ctx, &ctx.period).await?;
        let previous_profit = self.breakdown(ctx, &ctx.previous).await?;
        let events = aggregation::scheduled_events(self.port, &ctx.period).await?;
        let previous_events = aggregation::scheduled_events(self.port, &ctx.previous).await?;
        let utilization = self.utilization(ctx, &ctx.period).await?;

        Ok(section.metrics(vec![
            money_card("revenue", current.revenue, Some(previous.revenue)),
            count_card("orders", current.count, Some(previous.count)),
            money_card("avg_order_value", current.avg_order_value, Some(previous.avg_order_value)),
            money_card("gross_profit", profit.gross_profit, Some(previous_profit.gross_profit)),
            hours_card("hours", profit.labor_hours, Some(previous_profit.labor_hours)),
            percent_card("utilization", utilization),
            count_card("scheduled_events", events, Some(previous_events)),
        ]))
    }

    /// Revenue and order counts per bucket, optionally re-bucketed.
    async fn dashboard_trend(
        &self,
        ctx: &ViewContext,
        section: Section,
        granularity: Option<Granularity>,
    ) -> Result<Section> {
        let period = granularity.map_or(ctx.period, |g| ctx.period.with_granularity(g));
        let series = aggregation::orders_series(self.port, &period, &ctx.filters).await?;
        #[allow(clippy::cast_precision_loss)]
        let orders = Series::from_buckets(
            "orders",
            series.iter().map(|point| (&point.bucket, point.count as f64)),
        );
        Ok(section
            .series(money_series("revenue", &series, |p| p.revenue))
            .series(orders))
    }

    async fn kpi_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let evaluations = self.kpi_evaluations(ctx).await?;
        Ok(section
            .table(kpi_table(&evaluations))
            .alerts(kpi_alerts(&evaluations)))
    }

    async fn report_summary(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = self.breakdown(ctx, &ctx.period).await?;
        let previous = self.breakdown(ctx, &ctx.previous).await?;
        let orders = aggregation::orders_summary(self.port, &ctx.period, &ctx.filters).await?;

        let mut cards = vec![count_card("orders", orders.count, None)];
        cards.extend(breakdown_cards(&current, Some(&previous)));
        cards.push(hours_card("hours", current.labor_hours, Some(previous.labor_hours)));
        Ok(section.metrics(cards))
    }

    async fn report_orders(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let section = self.order_types(ctx, section, "orders_by_type").await?;
        self.status_table(ctx, section).await
    }

    async fn report_warehouse(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let section = self.stock_cards(ctx, section).await?;
        self.abc_section(ctx, section).await
    }
}

fn target_table(ctx: &ViewContext, section: Section) -> Section {
    let mut table = Table::new("targets", &["key", "value"]);
    for key in TargetKey::ALL {
        table.push(vec![
            Cell::text(key.storage_key()),
            Cell::Number(numeric::to_f64(ctx.targets.get(key))),
        ]);
    }
    section.table(table)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use crate::config::AnalyticsConfig;
    use crate::core::composer::{Composer, ViewName, ViewRequest};
    use crate::core::numeric;
    use crate::core::port::SeaOrmPort;
    use crate::core::report::ReportKind;
    use crate::core::snapshot::{Cell, MetricValue};
    use crate::core::targets::{TargetKey, TargetStore};
    use crate::errors::Result;
    use crate::test_utils::{date, seed_workshop, setup_test_db};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_dashboard_cards() -> Result<()> {
        let db = setup_test_db().await?;
        seed_workshop(&db).await?;
        let port = SeaOrmPort::new(db.clone());
        let targets = TargetStore::new(db);
        let config = AnalyticsConfig::default();

        let request = ViewRequest::new(ViewName::Dashboard, date(2024, 3, 31))
            .with_range(date(2024, 3, 1), date(2024, 3, 31));
        let snapshot = Composer::new(&port, &targets, &config).compose(&request).await?;

        // 7500 revenue less 2300 material
        assert_eq!(
            snapshot.metric("gross_profit").map(|card| &card.value),
            Some(&MetricValue::Money(numeric::money(5200.0)))
        );
        assert_eq!(
            snapshot.metric("hours").map(|card| &card.value),
            Some(&MetricValue::Hours(numeric::hours(14.5)))
        );
        // The cancelled appointment does not count
        assert_eq!(
            snapshot.metric("scheduled_events").map(|card| &card.value),
            Some(&MetricValue::Count(1))
        );
        assert_eq!(snapshot.series("orders").map(|s| s.values().iter().sum::<f64>()), Some(3.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_kpi_view_lists_targets() -> Result<()> {
        let db = setup_test_db().await?;
        seed_workshop(&db).await?;
        let port = SeaOrmPort::new(db.clone());
        let targets = TargetStore::new(db);
        targets.set(TargetKey::HourlyRateDefault, Decimal::from(450)).await?;
        let config = AnalyticsConfig::default();

        let snapshot = Composer::new(&port, &targets, &config)
            .compose(&ViewRequest::new(ViewName::Kpi, date(2024, 3, 31)))
            .await?;

        let table = snapshot.table("targets").unwrap();
        assert_eq!(table.rows.len(), TargetKey::ALL.len());
        assert_eq!(table.rows[0], [Cell::text("kpi_monthly_revenue"), Cell::Number(500_000.0)]);
        assert_eq!(table.rows[6], [Cell::text("hourly_rate_default"), Cell::Number(450.0)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_quarterly_report_trend_is_monthly() -> Result<()> {
        let db = setup_test_db().await?;
        seed_workshop(&db).await?;
        let port = SeaOrmPort::new(db.clone());
        let targets = TargetStore::new(db);
        let config = AnalyticsConfig::default();

        let request = ViewRequest::new(ViewName::Report(ReportKind::Quarterly), date(2024, 4, 10));
        let snapshot = Composer::new(&port, &targets, &config).compose(&request).await?;

        let keys: Vec<&str> = snapshot.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["summary", "orders", "mechanics", "warehouse", "kpi", "trend"]);
        let revenue = snapshot.series("revenue").unwrap();
        assert_eq!(revenue.values(), [0.0, 0.0, 7500.0]);
        assert!(snapshot.table("orders_by_status").is_some());
        assert!(snapshot.table("workload").is_some());
        Ok(())
    }
}
