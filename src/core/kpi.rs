//! KPI evaluator.
//!
//! Compares current-period indicators with the persisted targets and
//! classifies each KPI. Output is ordered by KPI key and carries machine
//! recommendation codes; the renderer picks the localized text.

use crate::core::aggregation::OrdersSummary;
use crate::core::finance::margin_pct;
use crate::core::numeric::{self, ratio, round_to};
use crate::core::period::Period;
use crate::core::targets::{KpiTargets, TargetKey};
use serde::Serialize;

/// Evaluated KPI, declared in key order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiKey {
    /// Average order value
    AvgOrderValue,
    /// Customer satisfaction in percent
    CustomerSatisfaction,
    /// Gross margin in percent
    MarginTarget,
    /// Mechanic utilization in percent
    MechanicUtilization,
    /// Orders per month
    MonthlyOrders,
    /// Revenue per month
    MonthlyRevenue,
}

impl KpiKey {
    /// Every KPI in key order
    pub const ALL: [Self; 6] = [
        Self::AvgOrderValue,
        Self::CustomerSatisfaction,
        Self::MarginTarget,
        Self::MechanicUtilization,
        Self::MonthlyOrders,
        Self::MonthlyRevenue,
    ];

    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AvgOrderValue => "avg_order_value",
            Self::CustomerSatisfaction => "customer_satisfaction",
            Self::MarginTarget => "margin_target",
            Self::MechanicUtilization => "mechanic_utilization",
            Self::MonthlyOrders => "monthly_orders",
            Self::MonthlyRevenue => "monthly_revenue",
        }
    }

    /// Target backing this KPI
    #[must_use]
    pub const fn target_key(self) -> TargetKey {
        match self {
            Self::AvgOrderValue => TargetKey::AvgOrderValue,
            Self::CustomerSatisfaction => TargetKey::CustomerSatisfaction,
            Self::MarginTarget => TargetKey::MarginTarget,
            Self::MechanicUtilization => TargetKey::MechanicUtilization,
            Self::MonthlyOrders => TargetKey::MonthlyOrders,
            Self::MonthlyRevenue => TargetKey::MonthlyRevenue,
        }
    }
}

/// KPI severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// On target
    Ok,
    /// Off target
    Warn,
    /// Far off target
    Critical,
}

impl Severity {
    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Critical => "critical",
        }
    }
}

/// Measured KPI values; `None` when the period has no source for it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiActuals {
    /// Revenue, normalized to a month for periods longer than one
    pub monthly_revenue: Option<f64>,
    /// Orders, normalized like revenue
    pub monthly_orders: Option<f64>,
    /// Average order value
    pub avg_order_value: Option<f64>,
    /// Utilization in percent
    pub mechanic_utilization: Option<f64>,
    /// Gross margin in percent
    pub margin_pct: Option<f64>,
    /// Satisfaction in percent
    pub customer_satisfaction: Option<f64>,
}

impl KpiActuals {
    /// Actuals of a period. Revenue and order counts of periods longer than
    /// 31 days are scaled to a 30-day month. The store holds no satisfaction
    /// data, so that KPI stays unevaluated.
    #[must_use]
    pub fn from_period(summary: &OrdersSummary, utilization: Option<f64>, period: &Period) -> Self {
        let days = period.len_days();
        #[allow(clippy::cast_precision_loss)]
        let scale = if days > 31 { 30.0 / days as f64 } else { 1.0 };
        #[allow(clippy::cast_precision_loss)]
        let orders = summary.count as f64;

        Self {
            monthly_revenue: Some(round_to(numeric::to_f64(summary.revenue) * scale, 2)),
            monthly_orders: Some(round_to(orders * scale, 1)),
            avg_order_value: Some(numeric::to_f64(summary.avg_order_value)),
            mechanic_utilization: utilization,
            margin_pct: margin_pct(summary.revenue - summary.material_cost, summary.revenue),
            customer_satisfaction: None,
        }
    }

    const fn actual(&self, key: KpiKey) -> Option<f64> {
        match key {
            KpiKey::AvgOrderValue => self.avg_order_value,
            KpiKey::CustomerSatisfaction => self.customer_satisfaction,
            KpiKey::MarginTarget => self.margin_pct,
            KpiKey::MechanicUtilization => self.mechanic_utilization,
            KpiKey::MonthlyOrders => self.monthly_orders,
            KpiKey::MonthlyRevenue => self.monthly_revenue,
        }
    }
}

/// Machine code plus default wording of a recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    /// Stable key for localization
    pub code: &'static str,
    /// Default English text
    pub message: &'static str,
}

/// Result for one KPI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiEvaluation {
    /// KPI
    pub key: KpiKey,
    /// Measured value
    pub actual: Option<f64>,
    /// Target value
    pub target: f64,
    /// Percent of target, or the value itself for utilization
    pub progress: Option<f64>,
    /// `None` when there was no actual to evaluate
    pub severity: Option<Severity>,
    /// Set for every non-ok severity
    pub recommendation: Option<Recommendation>,
}

/// Evaluates every KPI, in key order.
#[must_use]
pub fn evaluate(actuals: &KpiActuals, targets: &KpiTargets) -> Vec<KpiEvaluation> {
    KpiKey::ALL
        .into_iter()
        .map(|key| {
            let target = numeric::to_f64(targets.get(key.target_key()));
            let actual = actuals.actual(key);
            let progress = actual.map(|value| round_to(progress(key, value, target), 1));
            let severity = actual
                .zip(progress)
                .map(|(value, progress)| classify(key, value, target, progress));
            KpiEvaluation {
                key,
                actual,
                target,
                progress,
                severity,
                recommendation: severity
                    .zip(actual)
                    .and_then(|(severity, value)| recommend(key, severity, value, target)),
            }
        })
        .collect()
}

fn progress(key: KpiKey, actual: f64, target: f64) -> f64 {
    match key {
        KpiKey::MechanicUtilization => actual,
        _ => ratio(actual, target) * 100.0,
    }
}

/// Severity of one KPI.
///
/// | KPI | critical | warn |
/// |---|---|---|
/// | monthly revenue / orders | progress < 70 | progress < 90 |
/// | average order value | | progress < 80 |
/// | utilization | | < 60 or > 95 |
/// | margin | actual < 0.7 × target | actual < target |
/// | satisfaction | | progress < 80 |
#[must_use]
pub fn classify(key: KpiKey, actual: f64, target: f64, progress: f64) -> Severity {
    match key {
        KpiKey::MonthlyRevenue | KpiKey::MonthlyOrders => {
            if progress < 70.0 {
                Severity::Critical
            } else if progress < 90.0 {
                Severity::Warn
            } else {
                Severity::Ok
            }
        }
        KpiKey::AvgOrderValue | KpiKey::CustomerSatisfaction => {
            if progress < 80.0 {
                Severity::Warn
            } else {
                Severity::Ok
            }
        }
        KpiKey::MechanicUtilization => {
            if (60.0..=95.0).contains(&progress) {
                Severity::Ok
            } else {
                Severity::Warn
            }
        }
        KpiKey::MarginTarget => {
            if actual < 0.7 * target {
                Severity::Critical
            } else if actual < target {
                Severity::Warn
            } else {
                Severity::Ok
            }
        }
    }
}

fn recommend(key: KpiKey, severity: Severity, actual: f64, target: f64) -> Option<Recommendation> {
    if severity == Severity::Ok {
        return None;
    }
    let (code, message) = match key {
        KpiKey::MonthlyRevenue => (
            "increase_revenue",
            "Revenue is behind target; review pricing and promote high-value services.",
        ),
        KpiKey::MonthlyOrders => (
            "increase_orders",
            "Order intake is low; follow up with returning customers and plan a seasonal campaign.",
        ),
        KpiKey::AvgOrderValue => (
            "raise_order_value",
            "Average order value is low; offer related services with each order.",
        ),
        KpiKey::MechanicUtilization if actual > target.max(95.0) => (
            "reduce_overload",
            "Mechanics are overloaded; spread the work or add capacity.",
        ),
        KpiKey::MechanicUtilization => (
            "raise_utilization",
            "Mechanics have idle time; schedule more work or reduce capacity.",
        ),
        KpiKey::MarginTarget => (
            "improve_margin",
            "Margin is below target; check material prices and discounts.",
        ),
        KpiKey::CustomerSatisfaction => (
            "improve_satisfaction",
            "Customer satisfaction is below target; review complaints and turnaround times.",
        ),
    };
    Some(Recommendation { code, message })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use rust_decimal::Decimal;

    fn non_ok(evaluations: &[KpiEvaluation]) -> Vec<(KpiKey, Severity)> {
        evaluations
            .iter()
            .filter_map(|e| e.severity.filter(|s| *s != Severity::Ok).map(|s| (e.key, s)))
            .collect()
    }

    #[test]
    fn test_revenue_and_margin_critical() {
        let actuals = KpiActuals {
            monthly_revenue: Some(320_000.0),
            margin_pct: Some(18.0),
            ..KpiActuals::default()
        };
        let targets = KpiTargets::default()
            .with(TargetKey::MonthlyRevenue, Decimal::from(500_000))
            .with(TargetKey::MarginTarget, Decimal::from(30));

        let evaluations = evaluate(&actuals, &targets);
        let revenue = evaluations
            .iter()
            .find(|e| e.key == KpiKey::MonthlyRevenue)
            .map(|e| e.progress);
        assert_eq!(revenue, Some(Some(64.0)));
        assert_eq!(
            non_ok(&evaluations),
            [
                (KpiKey::MarginTarget, Severity::Critical),
                (KpiKey::MonthlyRevenue, Severity::Critical)
            ]
        );
    }

    #[test]
    fn test_missing_actuals_are_not_evaluated() {
        let evaluations = evaluate(&KpiActuals::default(), &KpiTargets::default());
        assert_eq!(evaluations.len(), 6);
        assert!(evaluations.iter().all(|e| e.severity.is_none() && e.recommendation.is_none()));
    }

    #[test]
    fn test_ordering_by_key() {
        let keys: Vec<&str> = evaluate(&KpiActuals::default(), &KpiTargets::default())
            .iter()
            .map(|e| e.key.as_str())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_utilization_band() {
        assert_eq!(classify(KpiKey::MechanicUtilization, 50.0, 80.0, 50.0), Severity::Warn);
        assert_eq!(classify(KpiKey::MechanicUtilization, 80.0, 80.0, 80.0), Severity::Ok);
        assert_eq!(classify(KpiKey::MechanicUtilization, 97.0, 80.0, 97.0), Severity::Warn);

        let overloaded = evaluate(
            &KpiActuals {
                mechanic_utilization: Some(97.0),
                ..KpiActuals::default()
            },
            &KpiTargets::default(),
        );
        let code = overloaded
            .iter()
            .find_map(|e| e.recommendation.as_ref().map(|r| r.code));
        assert_eq!(code, Some("reduce_overload"));
    }

    #[test]
    fn test_threshold_edges() {
        assert_eq!(classify(KpiKey::MonthlyOrders, 35.0, 50.0, 70.0), Severity::Warn);
        assert_eq!(classify(KpiKey::MonthlyOrders, 45.0, 50.0, 90.0), Severity::Ok);
        assert_eq!(classify(KpiKey::AvgOrderValue, 8000.0, 10000.0, 80.0), Severity::Ok);
        assert_eq!(classify(KpiKey::MarginTarget, 21.0, 30.0, 70.0), Severity::Warn);
        assert_eq!(classify(KpiKey::MarginTarget, 30.0, 30.0, 100.0), Severity::Ok);
    }
}
