//! Warehouse views: stock overview with indicators, and the issue forecast.

use super::{Composer, ViewContext, money_card, section, span};
use crate::core::aggregation::{self, ItemHistory};
use crate::core::domain::MovementType;
use crate::core::inventory::{
    self, AbcClass, abc_classification, dead_stock, margin_analysis, purchase_recommendations,
};
use crate::core::numeric::{self, round_to};
use crate::core::period::{Granularity, Period, shift_days};
use crate::core::port::DataAccessPort;
use crate::core::snapshot::{Cell, MetricCard, MetricValue, Section, Series, Table};
use crate::errors::Result;
use tracing::warn;

impl<P: DataAccessPort> Composer<'_, P> {
    pub(super) async fn warehouse_overview(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("stock", move |s| self.stock_cards(ctx, s)).await,
            section("movements", move |s| self.movement_trend(ctx, s)).await,
            section("abc", move |s| self.abc_section(ctx, s)).await,
            section("turnover", move |s| self.turnover_section(ctx, s)).await,
            section("margin", move |s| self.margin_section(ctx, s)).await,
            section("dead_stock", move |s| self.dead_stock_section(ctx, s)).await,
            section("purchase", move |s| self.purchase_section(ctx, s)).await,
        ]
    }

    pub(super) async fn warehouse_prediction(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("issue_forecast", move |s| self.issue_forecast(ctx, s)).await,
            section("purchase", move |s| self.purchase_section(ctx, s)).await,
        ]
    }

    pub(super) async fn stock_cards(&self, _ctx: &ViewContext, section: Section) -> Result<Section> {
        let stock = aggregation::stock_summary(self.port).await?;
        Ok(section.metrics(vec![
            money_card("stock_purchase_value", stock.total_purchase_value, None),
            money_card("stock_sale_value", stock.total_sale_value, None),
            money_card(
                "stock_potential_margin",
                stock.total_sale_value - stock.total_purchase_value,
                None,
            ),
            MetricCard::new("items", MetricValue::Count(stock.item_count)),
            MetricCard::new("items_below_min", MetricValue::Count(stock.items_below_min)),
        ]))
    }

    async fn movement_trend(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let points = aggregation::stock_movements_series(self.port, &ctx.period, None).await?;

        let mut section = section;
        for movement_type in MovementType::ALL {
            let typed: Vec<_> = points
                .iter()
                .filter(|point| point.movement_type == movement_type)
                .collect();
            let total: f64 = typed.iter().map(|point| point.quantity).sum();
            if total < 0.0 {
                warn!(movement_type = movement_type.as_str(), total, "negative movement total");
                ctx.flag_negative_stock_movement();
            }
            section = section
                .series(Series::from_buckets(
                    format!("{}_quantity", movement_type.as_str()),
                    typed.iter().map(|point| (&point.bucket, point.quantity)),
                ))
                .series(Series::from_buckets(
                    format!("{}_value", movement_type.as_str()),
                    typed
                        .iter()
                        .map(|point| (&point.bucket, numeric::to_f64(point.value))),
                ));
        }
        Ok(section)
    }

    async fn period_items(&self, period: &Period) -> Result<Vec<ItemHistory>> {
        aggregation::item_issue_history(self.port, period, None).await
    }

    pub(super) async fn abc_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let entries = abc_classification(&self.period_items(&ctx.period).await?);

        let cards = [AbcClass::A, AbcClass::B, AbcClass::C]
            .into_iter()
            .map(|class| {
                let count = entries.iter().filter(|entry| entry.class == class).count() as u64;
                MetricCard::new(format!("class_{}", class.as_str()), MetricValue::Count(count))
            })
            .collect();

        let mut table = Table::new(
            "abc",
            &["item_id", "name", "value", "share_pct", "cumulative_pct", "class"],
        );
        for entry in entries {
            table.push(vec![
                Cell::Integer(entry.item_id),
                Cell::Text(entry.name),
                Cell::Money(entry.value),
                Cell::Percent(entry.share_pct),
                Cell::Percent(entry.cumulative_pct),
                Cell::text(entry.class.as_str()),
            ]);
        }
        Ok(section.metrics(cards).table(table))
    }

    async fn turnover_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let items = self.period_items(&ctx.period).await?;
        let mut table = Table::new(
            "turnover",
            &[
                "item_id",
                "name",
                "current_stock",
                "total_issued",
                "turnover_ratio",
                "sales_per_month",
                "days_to_stockout",
                "band",
            ],
        );
        for entry in inventory::turnover(&items, ctx.period.months()) {
            table.push(vec![
                Cell::Integer(entry.item_id),
                Cell::Text(entry.name),
                Cell::Number(entry.current_stock),
                Cell::Number(entry.total_issued),
                Cell::Number(entry.turnover_ratio),
                Cell::Number(entry.sales_per_month),
                Cell::opt_number(entry.days_to_stockout),
                Cell::text(entry.band.as_str()),
            ]);
        }
        Ok(section.table(table))
    }

    async fn margin_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let analysis = margin_analysis(&self.period_items(&ctx.period).await?);
        if analysis.negative_margin_items > 0 {
            ctx.flag_negative_unit_margin();
        }

        let mut table = Table::new(
            "margin",
            &[
                "item_id",
                "name",
                "quantity",
                "price_purchase",
                "price_sale",
                "margin_unit",
                "margin_pct",
            ],
        );
        for row in analysis.rows {
            table.push(vec![
                Cell::Integer(row.item_id),
                Cell::Text(row.name),
                Cell::Number(row.quantity),
                Cell::Money(row.price_purchase),
                Cell::Money(row.price_sale),
                Cell::Money(row.margin_unit),
                Cell::opt_percent(row.margin_pct),
            ]);
        }

        Ok(section
            .metrics(vec![
                money_card("total_purchase_value", analysis.total_purchase_value, None),
                money_card("total_sale_value", analysis.total_sale_value, None),
                money_card("total_margin", analysis.total_margin, None),
                MetricCard::new(
                    "weighted_margin",
                    MetricValue::Percent(analysis.weighted_margin_pct),
                ),
                MetricCard::new(
                    "negative_margin_items",
                    MetricValue::Count(analysis.negative_margin_items as u64),
                ),
            ])
            .table(table))
    }

    async fn dead_stock_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let report = dead_stock(
            &self.period_items(&ctx.period).await?,
            ctx.as_of,
            self.config.dead_stock_threshold_days,
        );

        let mut table = Table::new(
            "dead_stock",
            &["item_id", "name", "quantity", "value", "last_movement_date", "days_idle"],
        );
        let count = report.entries.len() as u64;
        for entry in report.entries {
            table.push(vec![
                Cell::Integer(entry.item_id),
                Cell::Text(entry.name),
                Cell::Number(entry.quantity),
                Cell::Money(entry.value),
                Cell::opt_date(entry.last_movement_date),
                entry.days_idle.map_or(Cell::Empty, Cell::Integer),
            ]);
        }
        Ok(section
            .metrics(vec![
                MetricCard::new("dead_items", MetricValue::Count(count)),
                money_card("dead_stock_value", report.total_value, None),
            ])
            .table(table))
    }

    /// Purchase plan from consumption over the lookback window ending at the
    /// reference date, independent of the view period.
    pub(super) async fn purchase_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let lookback = self.config.purchase_lookback_days.max(1);
        let window = span(
            shift_days(ctx.as_of, -(i64::from(lookback) - 1)),
            ctx.as_of,
            Granularity::Day,
        );
        let recommendations = purchase_recommendations(
            &self.period_items(&window).await?,
            lookback,
            self.config.purchase_horizon_days,
        );

        let mut table = Table::new(
            "purchase",
            &[
                "item_id",
                "name",
                "supplier",
                "current_stock",
                "min_quantity",
                "consumption_per_day",
                "predicted_consumption",
                "recommended_purchase",
                "estimated_cost",
                "status",
            ],
        );
        for entry in &recommendations {
            table.push(vec![
                Cell::Integer(entry.item_id),
                Cell::text(entry.name.as_str()),
                Cell::opt_text(entry.supplier.as_deref()),
                Cell::Number(entry.current_stock),
                Cell::Number(entry.min_quantity),
                Cell::Number(round_to(entry.consumption_per_day, 3)),
                Cell::Number(entry.predicted_consumption),
                Cell::Number(entry.recommended_purchase),
                Cell::Money(entry.estimated_cost),
                Cell::text(entry.status.as_str()),
            ]);
        }
        let total_cost = numeric::sum_money(recommendations.iter().map(|entry| &entry.estimated_cost));
        Ok(section
            .metrics(vec![money_card("purchase_cost", total_cost, None)])
            .table(table))
    }

    async fn issue_forecast(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let points = aggregation::stock_movements_series(self.port, &ctx.period, None).await?;
        let history: Vec<f64> = points
            .iter()
            .filter(|point| point.movement_type == MovementType::Issue)
            .map(|point| numeric::to_f64(point.value))
            .collect();
        Ok(self.forecast_blocks(ctx, section, "issued_value", &history, None))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::config::AnalyticsConfig;
    use crate::core::composer::{Composer, ViewName, ViewRequest};
    use crate::core::numeric;
    use crate::core::port::SeaOrmPort;
    use crate::core::snapshot::{Cell, MetricValue};
    use crate::core::targets::TargetStore;
    use crate::errors::Result;
    use crate::test_utils::{date, seed_workshop, setup_test_db};

    #[tokio::test]
    async fn test_warehouse_overview() -> Result<()> {
        let db = setup_test_db().await?;
        seed_workshop(&db).await?;
        let port = SeaOrmPort::new(db.clone());
        let targets = TargetStore::new(db);
        let config = AnalyticsConfig::default();

        let request = ViewRequest::new(ViewName::WarehouseOverview, date(2024, 3, 31))
            .with_range(date(2024, 3, 1), date(2024, 3, 31));
        let snapshot = Composer::new(&port, &targets, &config).compose(&request).await?;

        // Brake pads sell below their purchase price
        assert!(snapshot.flags.negative_unit_margin);
        assert!(!snapshot.flags.negative_stock_movement);

        let abc = snapshot.table("abc").unwrap();
        assert_eq!(abc.rows.len(), 1);
        assert_eq!(abc.rows[0][2], Cell::Money(numeric::money(2000.0)));
        assert_eq!(abc.rows[0][5], Cell::text("A"));

        // Never-moved wiper first, then pads idle since June 2023
        let dead = snapshot.table("dead_stock").unwrap();
        let names: Vec<&Cell> = dead.rows.iter().map(|row| &row[1]).collect();
        assert_eq!(names, [&Cell::text("Stěrač"), &Cell::text("Brzdové destičky")]);
        assert_eq!(
            snapshot.metric("dead_stock_value").map(|card| &card.value),
            Some(&MetricValue::Money(numeric::money(1500.0)))
        );

        assert_eq!(snapshot.series("issue_quantity").map(|s| s.values().iter().sum::<f64>()), Some(10.0));
        Ok(())
    }
}
