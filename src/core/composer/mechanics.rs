//! Mechanic views: overview, detail, comparison, trends and specialization.

use super::{Composer, ViewContext, count_card, hours_card, money_card, percent_card, section};
use crate::core::aggregation::{self, MechanicWorkload};
use crate::core::finance;
use crate::core::numeric::{self, round_to};
use crate::core::period::working_days;
use crate::core::port::DataAccessPort;
use crate::core::snapshot::{Cell, MetricCard, MetricValue, Section, Series, Table};
use crate::core::trends::moving_average;
use crate::errors::Result;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

impl<P: DataAccessPort> Composer<'_, P> {
    pub(super) async fn mechanics_overview(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("summary", move |s| self.workload_cards(ctx, s)).await,
            section("workload", move |s| self.workload_table(ctx, s)).await,
        ]
    }

    pub(super) async fn mechanics_detail(&self, ctx: &ViewContext, mechanic_id: i64) -> Vec<Section> {
        vec![
            section("profile", move |s| self.mechanic_profile(ctx, s, mechanic_id)).await,
            section("hours_trend", move |s| self.hours_trend(ctx, s)).await,
            section("by_type", move |s| self.specialization_table(ctx, s)).await,
            section("orders", move |s| self.top_orders(ctx, s)).await,
        ]
    }

    pub(super) async fn mechanics_comparison(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("comparison", move |s| self.comparison(ctx, s)).await]
    }

    pub(super) async fn mechanics_trends(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("hours_trend", move |s| self.hours_trend(ctx, s)).await]
    }

    pub(super) async fn mechanics_specialization(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![section("specialization", move |s| self.specialization_table(ctx, s)).await]
    }

    fn individual_utilization(&self, ctx: &ViewContext, hours: Decimal) -> f64 {
        finance::utilization(
            numeric::to_f64(hours),
            working_days(&ctx.period),
            self.config.workday_hours,
            1,
        )
    }

    async fn workload_cards(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current = aggregation::workload_summary(self.port, &ctx.period, &ctx.filters).await?;
        let previous =
            aggregation::workload_summary(self.port, &ctx.previous, &ctx.filters).await?;
        let utilization = self.utilization(ctx, &ctx.period).await?;

        Ok(section.metrics(vec![
            hours_card("hours", current.total_hours, Some(previous.total_hours)),
            count_card(
                "active_mechanics",
                current.distinct_mechanics,
                Some(previous.distinct_mechanics),
            ),
            count_card("orders_worked", current.distinct_orders, Some(previous.distinct_orders)),
            percent_card("utilization", utilization),
        ]))
    }

    pub(super) async fn workload_table(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let workload =
            aggregation::workload_by_mechanic(self.port, &ctx.period, &ctx.filters).await?;
        let mut table = Table::new(
            "workload",
            &["user_id", "full_name", "hours", "orders", "utilization_pct"],
        );
        for entry in &workload {
            table.push(vec![
                Cell::Integer(entry.user_id),
                Cell::text(entry.full_name.as_str()),
                Cell::Hours(entry.total_hours),
                Cell::count(entry.distinct_orders),
                Cell::Percent(self.individual_utilization(ctx, entry.total_hours)),
            ]);
        }
        Ok(section.table(table))
    }

    /// Profile cards of one mechanic. An unknown id yields an empty section.
    async fn mechanic_profile(
        &self,
        ctx: &ViewContext,
        section: Section,
        mechanic_id: i64,
    ) -> Result<Section> {
        let Some(mechanic) = aggregation::mechanics(self.port, Some(mechanic_id))
            .await?
            .into_iter()
            .next()
        else {
            return Ok(section);
        };

        let workload = aggregation::workload_summary(self.port, &ctx.period, &ctx.filters).await?;
        let previous =
            aggregation::workload_summary(self.port, &ctx.previous, &ctx.filters).await?;
        let revenue = aggregation::mechanic_revenue(self.port, &ctx.period, &ctx.filters)
            .await?
            .into_iter()
            .find(|entry| entry.user_id == mechanic_id);

        let mut cards = vec![
            MetricCard::new("full_name", MetricValue::Text(mechanic.full_name)),
            MetricCard::new(
                "status",
                MetricValue::Text(if mechanic.active { "active" } else { "inactive" }.to_string()),
            ),
            hours_card("hours", workload.total_hours, Some(previous.total_hours)),
            count_card("orders_worked", workload.distinct_orders, Some(previous.distinct_orders)),
            percent_card(
                "utilization",
                self.individual_utilization(ctx, workload.total_hours),
            ),
        ];
        if let Some(revenue) = revenue {
            cards.push(money_card("assigned_revenue", revenue.revenue, None));
            cards.push(MetricCard::new(
                "revenue_per_hour",
                MetricValue::Money(numeric::money_ratio(revenue.revenue, workload.total_hours)),
            ));
        }
        Ok(section.metrics(cards))
    }

    async fn hours_trend(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let per_mechanic = aggregation::hours_series(self.port, &ctx.period, &ctx.filters).await?;
        let buckets = ctx.period.buckets();

        let mut total = vec![0.0; buckets.len()];
        let mut section = section;
        for mechanic in &per_mechanic {
            for (slot, point) in total.iter_mut().zip(&mechanic.points) {
                *slot += numeric::to_f64(point.hours);
            }
            section = section.series(Series::from_buckets(
                format!("hours:{}", mechanic.user_id),
                mechanic
                    .points
                    .iter()
                    .map(|point| (&point.bucket, numeric::to_f64(point.hours))),
            ));
        }

        let total: Vec<f64> = total.into_iter().map(|hours| round_to(hours, 1)).collect();
        let averaged = moving_average(&total, self.config.moving_average_window);
        Ok(section
            .series(Series::from_buckets("total_hours", buckets.iter().zip(total)))
            .series(Series::from_buckets(
                "total_hours_moving_average",
                buckets.iter().zip(averaged),
            )))
    }

    async fn comparison(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let workload =
            aggregation::workload_by_mechanic(self.port, &ctx.period, &ctx.filters).await?;
        let revenue: BTreeMap<i64, Decimal> =
            aggregation::mechanic_revenue(self.port, &ctx.period, &ctx.filters)
                .await?
                .into_iter()
                .map(|entry| (entry.user_id, entry.revenue))
                .collect();
        let total_hours: Decimal = workload.iter().map(|entry| entry.total_hours).sum();

        let mut table = Table::new(
            "comparison",
            &[
                "user_id",
                "full_name",
                "hours",
                "orders",
                "revenue",
                "revenue_per_hour",
                "utilization_pct",
                "share_of_hours_pct",
            ],
        );
        for entry in &workload {
            let assigned = revenue.get(&entry.user_id).copied().unwrap_or(Decimal::ZERO);
            table.push(vec![
                Cell::Integer(entry.user_id),
                Cell::text(entry.full_name.as_str()),
                Cell::Hours(entry.total_hours),
                Cell::count(entry.distinct_orders),
                Cell::Money(assigned),
                Cell::Money(numeric::money_ratio(assigned, entry.total_hours)),
                Cell::Percent(self.individual_utilization(ctx, entry.total_hours)),
                Cell::Percent(share(entry.total_hours, total_hours)),
            ]);
        }

        let hours = Series::from_keys(
            "hours_by_mechanic",
            workload
                .iter()
                .map(|entry| (entry.full_name.clone(), numeric::to_f64(entry.total_hours))),
        );
        Ok(section.series(hours).table(table))
    }

    async fn specialization_table(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let by_type =
            aggregation::hours_by_mechanic_and_type(self.port, &ctx.period, &ctx.filters).await?;
        let workload =
            aggregation::workload_by_mechanic(self.port, &ctx.period, &ctx.filters).await?;
        let names: BTreeMap<i64, &MechanicWorkload> =
            workload.iter().map(|entry| (entry.user_id, entry)).collect();

        let mut table = Table::new(
            "specialization",
            &["user_id", "full_name", "order_type", "hours", "orders", "share_pct"],
        );
        let mut primary: BTreeMap<i64, (Decimal, &'static str)> = BTreeMap::new();
        for entry in &by_type {
            let mechanic = names.get(&entry.user_id);
            let mechanic_hours = mechanic.map_or(Decimal::ZERO, |m| m.total_hours);
            table.push(vec![
                Cell::Integer(entry.user_id),
                Cell::opt_text(mechanic.map(|m| m.full_name.as_str())),
                Cell::text(entry.order_type.as_str()),
                Cell::Hours(entry.hours),
                Cell::count(entry.distinct_orders),
                Cell::Percent(share(entry.hours, mechanic_hours)),
            ]);

            let best = primary
                .entry(entry.user_id)
                .or_insert((entry.hours, entry.order_type.as_str()));
            if entry.hours > best.0 {
                *best = (entry.hours, entry.order_type.as_str());
            }
        }

        let mut focus = Table::new("primary_type", &["user_id", "full_name", "order_type"]);
        for (user_id, (_, order_type)) in primary {
            focus.push(vec![
                Cell::Integer(user_id),
                Cell::opt_text(names.get(&user_id).map(|m| m.full_name.as_str())),
                Cell::text(order_type),
            ]);
        }
        Ok(section.table(table).table(focus))
    }
}

fn share(part: Decimal, whole: Decimal) -> f64 {
    round_to(
        numeric::ratio(numeric::to_f64(part), numeric::to_f64(whole)) * 100.0,
        1,
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use crate::config::AnalyticsConfig;
    use crate::core::composer::{Composer, ViewName, ViewRequest};
    use crate::core::numeric;
    use crate::core::port::SeaOrmPort;
    use crate::core::snapshot::{Cell, MetricValue};
    use crate::core::targets::TargetStore;
    use crate::errors::Result;
    use crate::test_utils::{date, seed_workshop, setup_test_db};

    async fn compose(view: ViewName) -> Result<crate::core::snapshot::ViewSnapshot> {
        let db = setup_test_db().await?;
        seed_workshop(&db).await?;
        let port = SeaOrmPort::new(db.clone());
        let targets = TargetStore::new(db);
        let config = AnalyticsConfig::default();
        let request = ViewRequest::new(view, date(2024, 3, 31))
            .with_range(date(2024, 3, 1), date(2024, 3, 31));
        Composer::new(&port, &targets, &config).compose(&request).await
    }

    #[tokio::test]
    async fn test_detail_is_scoped_to_the_mechanic() -> Result<()> {
        let snapshot = compose(ViewName::MechanicsDetail(1)).await?;

        assert_eq!(
            snapshot.metric("full_name").map(|card| &card.value),
            Some(&MetricValue::Text("Jan Novák".to_string()))
        );
        assert_eq!(
            snapshot.metric("hours").map(|card| &card.value),
            Some(&MetricValue::Hours(numeric::hours(10.0)))
        );
        // 10 h of 21 days × 8 h
        assert_eq!(
            snapshot.metric("utilization").map(|card| &card.value),
            Some(&MetricValue::Percent(6.0))
        );
        let orders = snapshot.table("top_orders").unwrap();
        assert_eq!(orders.rows.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_mechanic_gives_empty_profile() -> Result<()> {
        let snapshot = compose(ViewName::MechanicsDetail(99)).await?;
        assert!(snapshot.section("profile").is_some_and(|s| s.is_empty()));
        assert!(snapshot.table("top_orders").is_some_and(|t| t.rows.is_empty()));
        Ok(())
    }

    #[tokio::test]
    async fn test_comparison_shares() -> Result<()> {
        let snapshot = compose(ViewName::MechanicsComparison).await?;
        let table = snapshot.table("comparison").unwrap();

        assert_eq!(table.rows.len(), 2);
        // Jan 10 h and Petr 4.5 h of 14.5 h
        assert_eq!(table.rows[0][7], Cell::Percent(69.0));
        assert_eq!(table.rows[1][7], Cell::Percent(31.0));
        assert_eq!(table.rows[0][4], Cell::Money(numeric::money(5000.0)));
        Ok(())
    }
}
