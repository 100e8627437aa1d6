//! Trend views: time series, seasonality, period comparisons and forecasts.

use super::{
    Composer, ViewContext, full_months_before, last_full_quarter, last_full_year, section, span,
};
use super::financial::money_series;
use crate::core::aggregation::{self, OrdersPoint};
use crate::core::forecast::{forecast, seasonally_adjusted};
use crate::core::numeric::{self, round_to};
use crate::core::period::{Granularity, Period, following_buckets, month_end, month_start};
use crate::core::port::DataAccessPort;
use crate::core::snapshot::{Cell, MetricCard, MetricValue, Section, Series, Table};
use crate::core::trends::{
    Comparison, MonthTotal, SeasonalIndex, growth_curve, moving_average, quarter_over_quarter,
    seasonal_indices, weekday_pattern, year_over_year,
};
use crate::errors::Result;
use chrono::{Datelike, Months};

/// Months of history behind the seasonal adjustment of forecasts
const SEASONAL_HISTORY_MONTHS: u32 = 36;

const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

fn revenue_of(point: &OrdersPoint) -> f64 {
    numeric::to_f64(point.revenue)
}

#[allow(clippy::cast_precision_loss)]
fn count_of(point: &OrdersPoint) -> f64 {
    point.count as f64
}

impl<P: DataAccessPort> Composer<'_, P> {
    pub(super) async fn trends_time(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("series", move |s| self.time_series(ctx, s)).await,
            section("weekday", move |s| self.weekday_section(ctx, s)).await,
        ]
    }

    pub(super) async fn trends_seasonality(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("seasonality", move |s| self.seasonality_section(ctx, s)).await,
            section("weekday", move |s| self.weekday_section(ctx, s)).await,
        ]
    }

    pub(super) async fn trends_comparison(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("year_over_year", move |s| self.year_over_year_section(ctx, s)).await,
            section("quarter_over_quarter", move |s| self.quarter_over_quarter_section(ctx, s))
                .await,
        ]
    }

    pub(super) async fn revenue_prediction(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("forecast", move |s| self.projection(ctx, s, "revenue", revenue_of)).await,
            section("seasonality", move |s| self.seasonal_basis_section(ctx, s, revenue_of))
                .await,
        ]
    }

    pub(super) async fn orders_prediction(&self, ctx: &ViewContext) -> Vec<Section> {
        vec![
            section("forecast", move |s| self.projection(ctx, s, "orders", count_of)).await,
            section("seasonality", move |s| self.seasonal_basis_section(ctx, s, count_of)).await,
        ]
    }

    /// Appends the forecast of `history` to `section`.
    ///
    /// `history` holds one value per bucket of the view period. Predictions
    /// are keyed by the buckets following the period; with monthly buckets
    /// and `seasonal` indices a seasonally adjusted series is added too. A
    /// history too short for a regression marks the section as a warning.
    pub(super) fn forecast_blocks(
        &self,
        ctx: &ViewContext,
        section: Section,
        name: &str,
        history: &[f64],
        seasonal: Option<&[SeasonalIndex]>,
    ) -> Section {
        let result = forecast(history, self.config.forecast_periods);
        let future = following_buckets(&ctx.period, result.points.len());

        let mut table = Table::new(
            format!("{name}_forecast"),
            &["step", "bucket", "prediction", "lower", "upper"],
        );
        for (bucket, point) in future.iter().zip(&result.points) {
            table.push(vec![
                Cell::Integer(i64::try_from(point.step).unwrap_or(i64::MAX)),
                Cell::text(bucket.label.as_str()),
                Cell::Number(point.prediction),
                Cell::Number(point.lower),
                Cell::Number(point.upper),
            ]);
        }

        let mut cards = vec![
            MetricCard::new(format!("{name}_next_period"), MetricValue::Number(result.next_period)),
            MetricCard::new(
                format!("{name}_next_quarter"),
                MetricValue::Number(result.next_quarter),
            ),
            MetricCard::new(format!("{name}_next_year"), MetricValue::Number(result.next_year)),
            MetricCard::new("forecast_confidence", MetricValue::Percent(round_to(result.confidence, 1))),
        ];
        if let Some(line) = result.fit {
            cards.push(MetricCard::new("trend_slope", MetricValue::Number(round_to(line.slope, 2))));
        }

        let mut section = section
            .metrics(cards)
            .series(Series::from_buckets(
                format!("{name}_forecast"),
                future.iter().zip(result.points.iter().map(|p| p.prediction)),
            ))
            .series(Series::from_buckets(
                format!("{name}_lower"),
                future.iter().zip(result.points.iter().map(|p| p.lower)),
            ))
            .series(Series::from_buckets(
                format!("{name}_upper"),
                future.iter().zip(result.points.iter().map(|p| p.upper)),
            ));

        if let (Some(indices), Some(first)) = (seasonal, future.first()) {
            if ctx.period.granularity() == Granularity::Month {
                let adjusted = seasonally_adjusted(&result, first.start.month(), indices);
                section = section.series(Series::from_buckets(
                    format!("{name}_seasonal"),
                    future.iter().zip(adjusted),
                ));
            }
        }

        section = section.table(table);
        if result.degraded {
            section.warn("not enough history for a trend, repeating the last value")
        } else {
            section
        }
    }

    async fn time_series(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        let window = self.config.moving_average_window;

        let revenue = money_series("revenue", &series, |p| p.revenue);
        let revenue_average = Series::from_buckets(
            "revenue_moving_average",
            series.iter().map(|p| &p.bucket).zip(moving_average(&revenue.values(), window)),
        );
        let orders = Series::from_buckets("orders", series.iter().map(|p| (&p.bucket, count_of(p))));
        let orders_average = Series::from_buckets(
            "orders_moving_average",
            series.iter().map(|p| &p.bucket).zip(moving_average(&orders.values(), window)),
        );

        let growth = growth_curve(
            &series
                .iter()
                .map(|p| (p.bucket.key.clone(), revenue_of(p)))
                .collect::<Vec<_>>(),
        );
        let mut table = Table::new("growth", &["bucket", "revenue", "growth_pct", "cumulative"]);
        for (point, bucket) in growth.iter().zip(series.iter().map(|p| &p.bucket)) {
            table.push(vec![
                Cell::text(bucket.label.as_str()),
                Cell::Number(point.value),
                Cell::opt_percent(point.growth_pct),
                Cell::Number(round_to(point.cumulative, 2)),
            ]);
        }

        Ok(section
            .series(revenue)
            .series(revenue_average)
            .series(orders)
            .series(orders_average)
            .table(table))
    }

    /// Orders per day of week over the view period, Sunday first.
    async fn weekday_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let daily_period = ctx.period.with_granularity(Granularity::Day);
        let daily: Vec<_> = aggregation::orders_series(self.port, &daily_period, &ctx.filters)
            .await?
            .into_iter()
            .map(|point| (point.bucket.start, point.count))
            .collect();
        let pattern = weekday_pattern(&daily);

        let mut table = Table::new("weekday_pattern", &["weekday", "day", "orders", "share_pct"]);
        for load in &pattern {
            let day = WEEKDAYS[load.weekday as usize % WEEKDAYS.len()];
            table.push(vec![
                Cell::Integer(i64::from(load.weekday)),
                Cell::text(day),
                Cell::count(load.orders),
                Cell::Percent(load.share_pct),
            ]);
        }
        #[allow(clippy::cast_precision_loss)]
        let series = Series::from_keys(
            "weekday_orders",
            pattern
                .iter()
                .map(|load| (WEEKDAYS[load.weekday as usize % WEEKDAYS.len()].to_string(), load.orders as f64)),
        );
        Ok(section.series(series).table(table))
    }

    /// Calendar-month totals over `period`, one per month touched.
    async fn month_totals<F>(&self, ctx: &ViewContext, period: &Period, value: F) -> Result<Vec<MonthTotal>>
    where
        F: Fn(&OrdersPoint) -> f64,
    {
        let monthly = period.with_granularity(Granularity::Month);
        Ok(aggregation::orders_series(self.port, &monthly, &ctx.filters)
            .await?
            .iter()
            .map(|point| MonthTotal {
                month_start: month_start(point.bucket.start.year(), point.bucket.start.month()),
                value: value(point),
            })
            .collect())
    }

    async fn seasonality_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let indices = seasonal_indices(&self.month_totals(ctx, &ctx.period, revenue_of).await?);
        Ok(seasonality_blocks(section, &indices))
    }

    async fn seasonal_basis(
        &self,
        ctx: &ViewContext,
        value: fn(&OrdersPoint) -> f64,
    ) -> Result<Vec<SeasonalIndex>> {
        let basis = full_months_before(ctx.as_of, SEASONAL_HISTORY_MONTHS);
        Ok(seasonal_indices(&self.month_totals(ctx, &basis, value).await?))
    }

    async fn seasonal_basis_section(
        &self,
        ctx: &ViewContext,
        section: Section,
        value: fn(&OrdersPoint) -> f64,
    ) -> Result<Section> {
        Ok(seasonality_blocks(section, &self.seasonal_basis(ctx, value).await?))
    }

    async fn projection(
        &self,
        ctx: &ViewContext,
        section: Section,
        name: &str,
        value: fn(&OrdersPoint) -> f64,
    ) -> Result<Section> {
        let series = aggregation::orders_series(self.port, &ctx.period, &ctx.filters).await?;
        let history: Vec<f64> = series.iter().map(value).collect();
        let indices = self.seasonal_basis(ctx, value).await?;

        let section = section.series(Series::from_buckets(
            name,
            series.iter().map(|p| &p.bucket).zip(history.iter().map(|v| round_to(*v, 2))),
        ));
        Ok(self.forecast_blocks(ctx, section, name, &history, Some(&indices)))
    }

    /// Months of the last full calendar year against the year before.
    async fn year_over_year_section(&self, ctx: &ViewContext, section: Section) -> Result<Section> {
        let current_year = last_full_year(ctx.as_of);
        let years = span(
            month_start(current_year - 1, 1),
            month_end(current_year, 12),
            Granularity::Month,
        );
        let totals = self.month_totals(ctx, &years, revenue_of).await?;
        let comparisons = year_over_year(&totals, current_year);

        let section = section
            .series(Series::from_keys(
                format!("revenue_{current_year}"),
                comparisons.iter().map(|c| (c.key.clone(), c.current)),
            ))
            .series(Series::from_keys(
                format!("revenue_{}", current_year - 1),
                comparisons.iter().map(|c| (c.key.clone(), c.previous)),
            ));
        Ok(section.table(comparison_table("year_over_year", &comparisons)))
    }

    /// The four last completed quarters, each against the one before.
    async fn quarter_over_quarter_section(
        &self,
        ctx: &ViewContext,
        section: Section,
    ) -> Result<Section> {
        let last_quarter = last_full_quarter(ctx.as_of);
        let first_quarter = last_quarter
            .checked_sub_months(Months::new(12))
            .unwrap_or(last_quarter);
        let end = last_quarter
            .checked_add_months(Months::new(3))
            .and_then(|next| next.pred_opt())
            .unwrap_or(last_quarter);
        let quarters = span(first_quarter, end, Granularity::Quarter);

        let totals: Vec<MonthTotal> =
            aggregation::orders_series(self.port, &quarters, &ctx.filters)
                .await?
                .iter()
                .map(|point| MonthTotal {
                    month_start: point.bucket.start,
                    value: revenue_of(point),
                })
                .collect();
        let comparisons = quarter_over_quarter(&totals);

        let section = section.series(Series::from_keys(
            "quarter_revenue",
            comparisons.iter().map(|c| (c.key.clone(), c.current)),
        ));
        Ok(section.table(comparison_table("quarter_over_quarter", &comparisons)))
    }
}

fn seasonality_blocks(section: Section, indices: &[SeasonalIndex]) -> Section {
    let mut table = Table::new("seasonal_indices", &["month", "mean", "index", "season"]);
    for index in indices {
        table.push(vec![
            Cell::Integer(i64::from(index.month)),
            Cell::opt_number(index.mean),
            Cell::opt_number(index.index),
            Cell::opt_text(index.season.map(|season| season.as_str())),
        ]);
    }
    let series = Series::from_keys(
        "seasonal_index",
        indices
            .iter()
            .map(|index| (format!("{:02}", index.month), index.index.unwrap_or(0.0))),
    );

    let peak = indices
        .iter()
        .filter_map(|index| index.index.map(|value| (index.month, value)))
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
    let section = match peak {
        Some((month, _)) => section.metrics(vec![MetricCard::new(
            "peak_month",
            MetricValue::Count(u64::from(month)),
        )]),
        None => section,
    };
    section.series(series).table(table)
}

fn comparison_table(name: &str, comparisons: &[Comparison]) -> Table {
    let mut table = Table::new(name, &["bucket", "current", "previous", "delta", "pct_delta"]);
    for comparison in comparisons {
        table.push(vec![
            Cell::text(comparison.key.as_str()),
            Cell::Number(comparison.current),
            Cell::Number(comparison.previous),
            Cell::Number(comparison.delta),
            Cell::opt_percent(comparison.pct_delta),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use crate::config::AnalyticsConfig;
    use crate::core::composer::{Composer, ViewName, ViewRequest};
    use crate::core::period::Granularity;
    use crate::core::port::SeaOrmPort;
    use crate::core::snapshot::{Cell, SectionStatus, ViewSnapshot};
    use crate::core::targets::TargetStore;
    use crate::errors::Result;
    use crate::test_utils::{date, seed_workshop, setup_test_db};

    async fn compose(request: ViewRequest) -> Result<ViewSnapshot> {
        let db = setup_test_db().await?;
        seed_workshop(&db).await?;
        let port = SeaOrmPort::new(db.clone());
        let targets = TargetStore::new(db);
        let config = AnalyticsConfig::default();
        Composer::new(&port, &targets, &config).compose(&request).await
    }

    fn quarter_keys(snapshot: &ViewSnapshot) -> Vec<Cell> {
        snapshot
            .table("quarter_over_quarter")
            .unwrap()
            .rows
            .iter()
            .map(|row| row[0].clone())
            .collect()
    }

    #[tokio::test]
    async fn test_year_over_year_skips_the_running_year() -> Result<()> {
        let snapshot =
            compose(ViewRequest::new(ViewName::TrendsComparison, date(2024, 3, 31))).await?;

        assert!(snapshot.series("revenue_2023").is_some());
        assert!(snapshot.series("revenue_2022").is_some());
        assert!(snapshot.series("revenue_2024").is_none());

        let yoy = snapshot.table("year_over_year").unwrap();
        assert_eq!(yoy.rows.len(), 12);
        assert_eq!(
            yoy.rows[2],
            [
                Cell::text("03"),
                Cell::Number(2000.0),
                Cell::Number(0.0),
                Cell::Number(2000.0),
                Cell::Empty,
            ]
        );
        assert_eq!(yoy.rows[10][1], Cell::Number(1500.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_year_over_year_on_the_last_day_of_the_year() -> Result<()> {
        let snapshot =
            compose(ViewRequest::new(ViewName::TrendsComparison, date(2024, 12, 31))).await?;

        let yoy = snapshot.table("year_over_year").unwrap();
        let march = &yoy.rows[2];
        assert_eq!(march[1], Cell::Number(7500.0));
        assert_eq!(march[2], Cell::Number(2000.0));
        assert_eq!(march[4], Cell::Percent(275.0));
        assert_eq!(yoy.rows[10][4], Cell::Percent(-100.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_quarter_over_quarter_uses_completed_quarters() -> Result<()> {
        let expected = [
            Cell::text("2023-Q2"),
            Cell::text("2023-Q3"),
            Cell::text("2023-Q4"),
            Cell::text("2024-Q1"),
        ];

        let quarter_end =
            compose(ViewRequest::new(ViewName::TrendsComparison, date(2024, 3, 31))).await?;
        assert_eq!(quarter_keys(&quarter_end), expected);

        // Ten days into Q2 the running quarter is left out
        let mid_quarter =
            compose(ViewRequest::new(ViewName::TrendsComparison, date(2024, 4, 10))).await?;
        assert_eq!(quarter_keys(&mid_quarter), expected);

        let qoq = mid_quarter.table("quarter_over_quarter").unwrap();
        // An empty quarter has no percentage change
        assert_eq!(qoq.rows[2][4], Cell::Empty);
        assert_eq!(qoq.rows[3][1], Cell::Number(7500.0));
        assert_eq!(qoq.rows[3][4], Cell::Percent(400.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_revenue_prediction_follows_the_history() -> Result<()> {
        let snapshot =
            compose(ViewRequest::new(ViewName::TrendsRevenuePrediction, date(2024, 4, 10))).await?;
        let config = AnalyticsConfig::default();

        assert_eq!(snapshot.series("revenue").map(|s| s.points.len()), Some(12));
        let forecast = snapshot.series("revenue_forecast").unwrap();
        assert_eq!(forecast.points.len(), config.forecast_periods);
        assert_eq!(forecast.points[0].key, "2024-04");
        assert!(forecast.points.iter().all(|point| point.value >= 0.0));
        assert!(snapshot.series("revenue_seasonal").is_some());
        assert_eq!(snapshot.section("forecast").map(|s| &s.status), Some(&SectionStatus::Ok));
        Ok(())
    }

    #[tokio::test]
    async fn test_short_history_degrades_with_warning() -> Result<()> {
        let request = ViewRequest::new(ViewName::TrendsOrdersPrediction, date(2024, 4, 10))
            .with_range(date(2024, 2, 1), date(2024, 3, 31))
            .with_granularity(Granularity::Month);
        let snapshot = compose(request).await?;

        let forecast = snapshot.section("forecast").unwrap();
        assert!(matches!(forecast.status, SectionStatus::Warning(_)));
        // Two months of history: the last one (3 orders) is repeated
        let values = snapshot.series("orders_forecast").unwrap().values();
        assert!(values.iter().all(|value| *value == 3.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_weekday_pattern_counts_orders() -> Result<()> {
        let request = ViewRequest::new(ViewName::TrendsTime, date(2024, 3, 31))
            .with_range(date(2024, 3, 1), date(2024, 3, 31));
        let snapshot = compose(request).await?;

        let table = snapshot.table("weekday_pattern").unwrap();
        assert_eq!(table.rows.len(), 7);
        assert_eq!(table.rows[0][1], Cell::text("sun"));
        // 4, 11 and 18 March 2024 are Mondays
        assert_eq!(table.rows[1][2], Cell::Integer(3));
        assert_eq!(table.rows[1][3], Cell::Percent(100.0));
        Ok(())
    }
}
