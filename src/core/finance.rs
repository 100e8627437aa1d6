//! Profit breakdown and mechanic utilization.
//!
//! `material_cost` on an order is the purchase cost of the parts it consumed;
//! labor cost is logged hours at the `hourly_rate_default` target.

use crate::core::aggregation::OrdersSummary;
use crate::core::numeric::{self, MONEY_SCALE, ratio, rescale, round_to};
use rust_decimal::Decimal;
use serde::Serialize;

/// Revenue, costs and profit of a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialBreakdown {
    /// Order revenue
    pub revenue: Decimal,
    /// Parts cost
    pub material_cost: Decimal,
    /// Logged hours
    pub labor_hours: Decimal,
    /// Rate applied to the hours
    pub hourly_rate: Decimal,
    /// `labor_hours × hourly_rate`
    pub labor_cost: Decimal,
    /// `revenue - material_cost`
    pub gross_profit: Decimal,
    /// `gross_profit - labor_cost`
    pub net_profit: Decimal,
    /// Gross profit over revenue in percent; `None` without revenue
    pub gross_margin_pct: Option<f64>,
    /// Net profit over revenue in percent; `None` without revenue
    pub net_margin_pct: Option<f64>,
}

/// Splits a period's orders into cost and profit lines.
#[must_use]
pub fn financial_breakdown(
    summary: &OrdersSummary,
    labor_hours: Decimal,
    hourly_rate: Decimal,
) -> FinancialBreakdown {
    let labor_cost = rescale(labor_hours * hourly_rate, MONEY_SCALE);
    let gross_profit = summary.revenue - summary.material_cost;
    let net_profit = gross_profit - labor_cost;

    FinancialBreakdown {
        revenue: summary.revenue,
        material_cost: summary.material_cost,
        labor_hours,
        hourly_rate,
        labor_cost,
        gross_profit,
        net_profit,
        gross_margin_pct: margin_pct(gross_profit, summary.revenue),
        net_margin_pct: margin_pct(net_profit, summary.revenue),
    }
}

/// `profit / revenue × 100` at one decimal place; `None` unless revenue is positive.
#[must_use]
pub fn margin_pct(profit: Decimal, revenue: Decimal) -> Option<f64> {
    (revenue > Decimal::ZERO).then(|| {
        round_to(
            ratio(numeric::to_f64(profit), numeric::to_f64(revenue)) * 100.0,
            1,
        )
    })
}

/// Logged hours over available hours, in percent.
///
/// Available hours are `working_days × workday_hours × mechanics`; zero
/// capacity yields zero.
#[must_use]
pub fn utilization(hours: f64, working_days: u32, workday_hours: f64, mechanics: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let capacity = f64::from(working_days) * workday_hours * mechanics as f64;
    round_to(ratio(hours, capacity) * 100.0, 1)
}
