//! Dashboard Composer - turns a named view request into a [`ViewSnapshot`].
//!
//! A request names a view, optionally a date range and filters, and the
//! reference date the view is computed for. The composer resolves the period,
//! reads one [`KpiTargets`] snapshot, then builds the view's sections one
//! after another. Sections are independent: a failing query turns its own
//! section into an `error` section and the rest of the view still renders.
//! Nothing is retried.

mod financial;
mod mechanics;
mod orders;
mod overview;
mod trends;
mod warehouse;

use crate::config::AnalyticsConfig;
use crate::core::aggregation::{self, Filters, TypeBreakdown};
use crate::core::finance;
use crate::core::kpi::{self, KpiActuals, KpiEvaluation, Severity};
use crate::core::numeric::{self, percent_change};
use crate::core::period::{
    Granularity, Period, QuickPeriod, bucket_start, month_end, month_start, previous_period,
    quick_period, working_days,
};
use crate::core::port::DataAccessPort;
use crate::core::report::ReportKind;
use crate::core::snapshot::{
    Alert, Cell, MetricCard, MetricValue, Section, SnapshotFlags, Table, ViewSnapshot,
};
use crate::core::targets::{KpiTargets, TargetStore};
use crate::errors::{Error, Result};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};

/// Every view the composer can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewName {
    /// Management dashboard
    Dashboard,
    /// Revenue, costs and profit at a glance
    FinancialOverview,
    /// Revenue detail
    FinancialRevenue,
    /// Cost detail
    FinancialCosts,
    /// Margins by order type and mechanic
    FinancialProfitability,
    /// Monthly growth and revenue forecast
    FinancialTrends,
    /// Order counts and breakdowns
    OrdersOverview,
    /// Highest-priced orders
    OrdersTop,
    /// Orders needing attention
    OrdersProblems,
    /// Customers by revenue
    OrdersCustomers,
    /// Vehicles by order count
    OrdersVehicles,
    /// Mechanic workload
    MechanicsOverview,
    /// One mechanic
    MechanicsDetail(i64),
    /// Mechanics side by side
    MechanicsComparison,
    /// Hours over time
    MechanicsTrends,
    /// Hours by order type per mechanic
    MechanicsSpecialization,
    /// Stock, movements and warehouse indicators
    WarehouseOverview,
    /// Orders and revenue over time
    TrendsTime,
    /// Seasonal indices and weekday pattern
    TrendsSeasonality,
    /// Year over year and quarter over quarter
    TrendsComparison,
    /// Revenue forecast
    TrendsRevenuePrediction,
    /// Order count forecast
    TrendsOrdersPrediction,
    /// Issued stock forecast and purchase plan
    TrendsWarehousePrediction,
    /// KPI evaluation
    Kpi,
    /// Printable report
    Report(ReportKind),
}

impl ViewName {
    /// Period the view covers when the request has none.
    #[must_use]
    pub fn default_period(self, as_of: NaiveDate, config: &AnalyticsConfig) -> Period {
        match self {
            Self::FinancialTrends | Self::MechanicsTrends | Self::TrendsTime => {
                quick_period(QuickPeriod::Last12Months, as_of)
            }
            Self::TrendsSeasonality => {
                span(month_start(as_of.year() - 2, 1), as_of, Granularity::Month)
            }
            Self::TrendsComparison => {
                let year = last_full_year(as_of);
                span(month_start(year - 1, 1), month_end(year, 12), Granularity::Month)
            }
            Self::TrendsRevenuePrediction
            | Self::TrendsOrdersPrediction
            | Self::TrendsWarehousePrediction => {
                full_months_before(as_of, config.forecast_history_months)
            }
            Self::Report(ReportKind::Monthly) => quick_period(QuickPeriod::LastMonth, as_of),
            Self::Report(ReportKind::Quarterly) => quick_period(QuickPeriod::LastQuarter, as_of)
                .with_granularity(Granularity::Month),
            Self::Report(ReportKind::Yearly) => quick_period(QuickPeriod::LastYear, as_of),
            _ => quick_period(QuickPeriod::ThisMonth, as_of),
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dashboard => "dashboard",
            Self::FinancialOverview => "financial.overview",
            Self::FinancialRevenue => "financial.revenue",
            Self::FinancialCosts => "financial.costs",
            Self::FinancialProfitability => "financial.profitability",
            Self::FinancialTrends => "financial.trends",
            Self::OrdersOverview => "orders.overview",
            Self::OrdersTop => "orders.top",
            Self::OrdersProblems => "orders.problems",
            Self::OrdersCustomers => "orders.customers",
            Self::OrdersVehicles => "orders.vehicles",
            Self::MechanicsOverview => "mechanics.overview",
            Self::MechanicsDetail(id) => return write!(f, "mechanics.detail({id})"),
            Self::MechanicsComparison => "mechanics.comparison",
            Self::MechanicsTrends => "mechanics.trends",
            Self::MechanicsSpecialization => "mechanics.specialization",
            Self::WarehouseOverview => "warehouse.overview",
            Self::TrendsTime => "trends.time",
            Self::TrendsSeasonality => "trends.seasonality",
            Self::TrendsComparison => "trends.comparison",
            Self::TrendsRevenuePrediction => "trends.revenue_prediction",
            Self::TrendsOrdersPrediction => "trends.orders_prediction",
            Self::TrendsWarehousePrediction => "trends.warehouse_prediction",
            Self::Kpi => "kpi",
            Self::Report(kind) => return write!(f, "report.{}", kind.as_str()),
        };
        f.write_str(name)
    }
}

impl FromStr for ViewName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || Error::UnknownView {
            name: s.to_string(),
        };

        if let Some(id) = s
            .strip_prefix("mechanics.detail(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return id.trim().parse().map(Self::MechanicsDetail).map_err(|_| unknown());
        }
        if let Some(kind) = s.strip_prefix("report.") {
            return kind.parse().map(Self::Report).map_err(|_| unknown());
        }

        Ok(match s {
            "dashboard" => Self::Dashboard,
            "financial.overview" => Self::FinancialOverview,
            "financial.revenue" => Self::FinancialRevenue,
            "financial.costs" => Self::FinancialCosts,
            "financial.profitability" => Self::FinancialProfitability,
            "financial.trends" => Self::FinancialTrends,
            "orders.overview" => Self::OrdersOverview,
            "orders.top" => Self::OrdersTop,
            "orders.problems" => Self::OrdersProblems,
            "orders.customers" => Self::OrdersCustomers,
            "orders.vehicles" => Self::OrdersVehicles,
            "mechanics.overview" => Self::MechanicsOverview,
            "mechanics.comparison" => Self::MechanicsComparison,
            "mechanics.trends" => Self::MechanicsTrends,
            "mechanics.specialization" => Self::MechanicsSpecialization,
            "warehouse.overview" => Self::WarehouseOverview,
            "trends.time" => Self::TrendsTime,
            "trends.seasonality" => Self::TrendsSeasonality,
            "trends.comparison" => Self::TrendsComparison,
            "trends.revenue_prediction" => Self::TrendsRevenuePrediction,
            "trends.orders_prediction" => Self::TrendsOrdersPrediction,
            "trends.warehouse_prediction" => Self::TrendsWarehousePrediction,
            "kpi" => Self::Kpi,
            _ => return Err(unknown()),
        })
    }
}

/// What the renderer asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    /// View to build
    pub view: ViewName,
    /// Inclusive date range; the view's default when absent
    pub range: Option<(NaiveDate, NaiveDate)>,
    /// Bucket granularity; the default of the resolved period when absent
    pub granularity: Option<Granularity>,
    /// Order type, status and mechanic filters
    pub filters: Filters,
    /// Reference date ("today") the view is computed for
    pub as_of: NaiveDate,
}

impl ViewRequest {
    /// Request for `view` with its default period.
    #[must_use]
    pub fn new(view: ViewName, as_of: NaiveDate) -> Self {
        Self {
            view,
            range: None,
            granularity: None,
            filters: Filters::default(),
            as_of,
        }
    }

    /// Explicit date range, validated when composing.
    #[must_use]
    pub const fn with_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.range = Some((from, to));
        self
    }

    /// Explicit bucket granularity.
    #[must_use]
    pub const fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// Uses an already resolved period.
    #[must_use]
    pub const fn with_period(self, period: Period) -> Self {
        self.with_range(period.from(), period.to())
            .with_granularity(period.granularity())
    }

    /// Replaces the filters.
    #[must_use]
    pub const fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

/// State shared by the sections of one view computation
pub(crate) struct ViewContext {
    pub(crate) period: Period,
    pub(crate) previous: Period,
    pub(crate) filters: Filters,
    pub(crate) as_of: NaiveDate,
    pub(crate) targets: KpiTargets,
    negative_stock_movement: AtomicBool,
    negative_unit_margin: AtomicBool,
}

impl ViewContext {
    fn flag_negative_stock_movement(&self) {
        self.negative_stock_movement.store(true, Ordering::Relaxed);
    }

    fn flag_negative_unit_margin(&self) {
        self.negative_unit_margin.store(true, Ordering::Relaxed);
    }

    fn flags(&self) -> SnapshotFlags {
        SnapshotFlags {
            negative_stock_movement: self.negative_stock_movement.load(Ordering::Relaxed),
            negative_unit_margin: self.negative_unit_margin.load(Ordering::Relaxed),
        }
    }
}

/// Builds view snapshots over a data access port
#[derive(Debug)]
pub struct Composer<'a, P> {
    port: &'a P,
    targets: &'a TargetStore,
    config: &'a AnalyticsConfig,
}

impl<'a, P: DataAccessPort> Composer<'a, P> {
    /// Creates a composer.
    ///
    /// # Arguments
    /// * `port` - Read-only storage access
    /// * `targets` - KPI targets, read once per view
    /// * `config` - Analytics tunables
    #[must_use]
    pub const fn new(port: &'a P, targets: &'a TargetStore, config: &'a AnalyticsConfig) -> Self {
        Self {
            port,
            targets,
            config,
        }
    }

    /// Builds one view.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPeriod`] when the requested range starts after
    /// it ends. Query failures never fail the call; they mark their section.
    #[instrument(skip(self, request), fields(view = %request.view))]
    pub async fn compose(&self, request: &ViewRequest) -> Result<ViewSnapshot> {
        let period = self.resolve_period(request)?;

        let targets = match self.targets.snapshot().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "target store unavailable, using default targets");
                KpiTargets::default()
            }
        };

        let filters = match request.view {
            ViewName::MechanicsDetail(id) => request.filters.mechanic(id),
            _ => request.filters,
        };
        let ctx = ViewContext {
            previous: previous_period(&period),
            period,
            filters,
            as_of: request.as_of,
            targets,
            negative_stock_movement: AtomicBool::new(false),
            negative_unit_margin: AtomicBool::new(false),
        };

        let sections = match request.view {
            ViewName::Dashboard => self.dashboard(&ctx).await,
            ViewName::Kpi => self.kpi_view(&ctx).await,
            ViewName::Report(kind) => self.report(&ctx, kind).await,
            ViewName::FinancialOverview => self.financial_overview(&ctx).await,
            ViewName::FinancialRevenue => self.financial_revenue(&ctx).await,
            ViewName::FinancialCosts => self.financial_costs(&ctx).await,
            ViewName::FinancialProfitability => self.financial_profitability(&ctx).await,
            ViewName::FinancialTrends => self.financial_trends(&ctx).await,
            ViewName::OrdersOverview => self.orders_overview(&ctx).await,
            ViewName::OrdersTop => self.orders_top(&ctx).await,
            ViewName::OrdersProblems => self.orders_problems(&ctx).await,
            ViewName::OrdersCustomers => self.orders_customers(&ctx).await,
            ViewName::OrdersVehicles => self.orders_vehicles(&ctx).await,
            ViewName::MechanicsOverview => self.mechanics_overview(&ctx).await,
            ViewName::MechanicsDetail(id) => self.mechanics_detail(&ctx, id).await,
            ViewName::MechanicsComparison => self.mechanics_comparison(&ctx).await,
            ViewName::MechanicsTrends => self.mechanics_trends(&ctx).await,
            ViewName::MechanicsSpecialization => self.mechanics_specialization(&ctx).await,
            ViewName::WarehouseOverview => self.warehouse_overview(&ctx).await,
            ViewName::TrendsTime => self.trends_time(&ctx).await,
            ViewName::TrendsSeasonality => self.trends_seasonality(&ctx).await,
            ViewName::TrendsComparison => self.trends_comparison(&ctx).await,
            ViewName::TrendsRevenuePrediction => self.revenue_prediction(&ctx).await,
            ViewName::TrendsOrdersPrediction => self.orders_prediction(&ctx).await,
            ViewName::TrendsWarehousePrediction => self.warehouse_prediction(&ctx).await,
        };
        debug!(sections = sections.len(), "view composed");

        Ok(ViewSnapshot {
            view: request.view.to_string(),
            period: ctx.period,
            as_of: ctx.as_of,
            flags: ctx.flags(),
            sections,
        })
    }

    fn resolve_period(&self, request: &ViewRequest) -> Result<Period> {
        let period = match request.range {
            Some((from, to)) => {
                let granularity = request
                    .granularity
                    .unwrap_or_else(|| auto_granularity(from, to));
                Period::new(from, to, granularity)?
            }
            None => request.view.default_period(request.as_of, self.config),
        };
        Ok(match request.granularity {
            Some(granularity) => period.with_granularity(granularity),
            None => period,
        })
    }

    /// Orders summary plus utilization, evaluated against the targets.
    async fn kpi_evaluations(&self, ctx: &ViewContext) -> Result<Vec<KpiEvaluation>> {
        let summary = aggregation::orders_summary(self.port, &ctx.period, &ctx.filters).await?;
        let utilization = self.utilization(ctx, &ctx.period).await?;
        let actuals = KpiActuals::from_period(&summary, Some(utilization), &ctx.period);
        Ok(kpi::evaluate(&actuals, &ctx.targets))
    }

    /// Logged hours over the capacity of the active mechanics, in percent.
    async fn utilization(&self, ctx: &ViewContext, period: &Period) -> Result<f64> {
        let workload = aggregation::workload_summary(self.port, period, &ctx.filters).await?;
        let staff = if ctx.filters.mechanic_id.is_some() {
            1
        } else {
            let active = aggregation::mechanics(self.port, None)
                .await?
                .iter()
                .filter(|mechanic| mechanic.active)
                .count() as u64;
            if active == 0 {
                workload.distinct_mechanics
            } else {
                active
            }
        };
        Ok(finance::utilization(
            numeric::to_f64(workload.total_hours),
            working_days(period),
            self.config.workday_hours,
            staff,
        ))
    }
}

/// Runs one section builder. A failure becomes an `error` section carrying
/// the diagnostic.
async fn section<F, Fut>(key: &'static str, build: F) -> Section
where
    F: FnOnce(Section) -> Fut,
    Fut: Future<Output = Result<Section>>,
{
    match build(Section::new(key)).await {
        Ok(section) => section,
        Err(e) => {
            warn!(section = key, error = %e, "section failed");
            Section::error(key, e.to_string())
        }
    }
}

fn span(from: NaiveDate, to: NaiveDate, granularity: Granularity) -> Period {
    Period::new(from, to, granularity)
        .unwrap_or_else(|_| quick_period(QuickPeriod::Today, to).with_granularity(granularity))
}

/// The `months` complete calendar months before the month of `as_of`.
fn full_months_before(as_of: NaiveDate, months: u32) -> Period {
    let this_month = month_start(as_of.year(), as_of.month());
    let last = this_month.pred_opt().unwrap_or(this_month);
    let first = this_month
        .checked_sub_months(Months::new(months.max(1)))
        .unwrap_or(this_month);
    span(first, month_end(last.year(), last.month()), Granularity::Month)
}

/// The latest calendar year that has ended by `as_of`.
fn last_full_year(as_of: NaiveDate) -> i32 {
    as_of.succ_opt().unwrap_or(as_of).year() - 1
}

/// First day of the latest quarter that has ended by `as_of`.
fn last_full_quarter(as_of: NaiveDate) -> NaiveDate {
    let current = bucket_start(as_of.succ_opt().unwrap_or(as_of), Granularity::Quarter);
    current.checked_sub_months(Months::new(3)).unwrap_or(current)
}

fn auto_granularity(from: NaiveDate, to: NaiveDate) -> Granularity {
    match (to - from).num_days() {
        ..=45 => Granularity::Day,
        46..=120 => Granularity::Week,
        121..=1100 => Granularity::Month,
        _ => Granularity::Quarter,
    }
}

fn money_card(key: &str, current: Decimal, previous: Option<Decimal>) -> MetricCard {
    MetricCard::new(key, MetricValue::Money(current)).with_trend(previous.and_then(|previous| {
        percent_change(numeric::to_f64(current), numeric::to_f64(previous))
            .map(|pct| numeric::round_to(pct, 1))
    }))
}

#[allow(clippy::cast_precision_loss)]
fn count_card(key: &str, current: u64, previous: Option<u64>) -> MetricCard {
    MetricCard::new(key, MetricValue::Count(current)).with_trend(previous.and_then(|previous| {
        percent_change(current as f64, previous as f64).map(|pct| numeric::round_to(pct, 1))
    }))
}

fn hours_card(key: &str, current: Decimal, previous: Option<Decimal>) -> MetricCard {
    MetricCard::new(key, MetricValue::Hours(current)).with_trend(previous.and_then(|previous| {
        percent_change(numeric::to_f64(current), numeric::to_f64(previous))
            .map(|pct| numeric::round_to(pct, 1))
    }))
}

fn percent_card(key: &str, value: f64) -> MetricCard {
    MetricCard::new(key, MetricValue::Percent(value))
}

/// Alerts for every KPI that is not `ok`, in KPI key order.
fn kpi_alerts(evaluations: &[KpiEvaluation]) -> Vec<Alert> {
    evaluations
        .iter()
        .filter_map(|evaluation| {
            let severity = evaluation.severity.filter(|s| *s != Severity::Ok)?;
            let recommendation = evaluation.recommendation.as_ref()?;
            Some(Alert {
                kpi: evaluation.key.as_str().to_string(),
                severity,
                code: recommendation.code.to_string(),
                message: recommendation.message.to_string(),
            })
        })
        .collect()
}

fn kpi_table(evaluations: &[KpiEvaluation]) -> Table {
    let mut table = Table::new(
        "kpi",
        &["kpi", "actual", "target", "progress_pct", "severity"],
    );
    for evaluation in evaluations {
        table.push(vec![
            Cell::text(evaluation.key.as_str()),
            Cell::opt_number(evaluation.actual),
            Cell::Number(evaluation.target),
            Cell::opt_percent(evaluation.progress),
            Cell::opt_text(evaluation.severity.map(Severity::as_str)),
        ]);
    }
    table
}

fn type_table(name: &str, breakdown: &[TypeBreakdown]) -> Table {
    let total: Decimal = breakdown.iter().map(|entry| entry.revenue).sum();
    let mut table = Table::new(
        name,
        &["order_type", "orders", "revenue", "material_cost", "share_pct"],
    );
    for entry in breakdown {
        let share = numeric::ratio(numeric::to_f64(entry.revenue), numeric::to_f64(total)) * 100.0;
        table.push(vec![
            Cell::text(entry.order_type.as_str()),
            Cell::count(entry.count),
            Cell::Money(entry.revenue),
            Cell::Money(entry.material_cost),
            Cell::Percent(numeric::round_to(share, 1)),
        ]);
    }
    table
}
