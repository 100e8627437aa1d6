//! Warehouse indicators: ABC classification, turnover, margins, dead stock
//! and consumption-based purchase recommendations.
//!
//! All functions are pure over [`ItemHistory`] rows so they can be tested
//! against fixture rows without a store.

use crate::core::aggregation::ItemHistory;
use crate::core::numeric::{self, ratio, round_to, sum_money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use std::cmp::Ordering;

/// Pareto tier of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AbcClass {
    /// Items making up the first 80 % of value
    A,
    /// The next 15 %
    B,
    /// The tail
    C,
}

impl AbcClass {
    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

/// One classified item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbcEntry {
    /// Item id
    pub item_id: i64,
    /// Item name
    pub name: String,
    /// Issued quantity × purchase price
    pub value: Decimal,
    /// Share of the grand total in percent
    pub share_pct: f64,
    /// Cumulative share including this item, in percent
    pub cumulative_pct: f64,
    /// Assigned tier
    pub class: AbcClass,
}

/// Classifies items by the value of their issues.
///
/// An item's value is its issued quantity times its current purchase
/// price. Movement unit prices are optional, so the history's
/// `issued_value` at movement prices is not used here.
///
/// Items are sorted by value descending (ties by id ascending). An item
/// belongs to A while the cumulative share before it is below 80 %, to B
/// while below 95 %, otherwise to C, so the item crossing a boundary stays
/// in the higher tier. Items without issue value are left out.
#[must_use]
pub fn abc_classification(items: &[ItemHistory]) -> Vec<AbcEntry> {
    let mut valued: Vec<(&ItemHistory, Decimal)> = items
        .iter()
        .map(|item| (item, issue_value(item)))
        .filter(|(_, value)| *value > Decimal::ZERO)
        .collect();
    valued.sort_by(|(a, va), (b, vb)| vb.cmp(va).then(a.item_id.cmp(&b.item_id)));

    let total = numeric::to_f64(valued.iter().map(|(_, value)| *value).sum());
    let mut cumulative = 0.0;
    valued
        .into_iter()
        .map(|(item, value)| {
            let class = if cumulative < 80.0 {
                AbcClass::A
            } else if cumulative < 95.0 {
                AbcClass::B
            } else {
                AbcClass::C
            };
            let share = ratio(numeric::to_f64(value), total) * 100.0;
            cumulative += share;
            AbcEntry {
                item_id: item.item_id,
                name: item.name.clone(),
                value,
                share_pct: round_to(share, 2),
                cumulative_pct: round_to(cumulative, 2),
                class,
            }
        })
        .collect()
}

fn issue_value(item: &ItemHistory) -> Decimal {
    let issued = Decimal::from_f64(item.total_issued).unwrap_or_default();
    numeric::rescale(issued * item.price_purchase, numeric::MONEY_SCALE)
}

/// Stock-out risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockBand {
    /// Runs out within 30 days
    Critical,
    /// Runs out within 60 days
    Warning,
    /// Enough stock, or no consumption
    Ok,
}

impl StockBand {
    /// Band for a days-to-stockout estimate; `None` means unbounded.
    #[must_use]
    pub fn from_days(days: Option<f64>) -> Self {
        match days {
            Some(days) if days < 30.0 => Self::Critical,
            Some(days) if days < 60.0 => Self::Warning,
            _ => Self::Ok,
        }
    }

    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Ok => "ok",
        }
    }
}

/// Turnover of one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnoverEntry {
    /// Item id
    pub item_id: i64,
    /// Item name
    pub name: String,
    /// Quantity on hand
    pub current_stock: f64,
    /// Quantity issued in the period
    pub total_issued: f64,
    /// `current_stock + total_issued / 2`
    pub avg_stock: f64,
    /// `total_issued / avg_stock`
    pub turnover_ratio: f64,
    /// Issued per 30-day month
    pub sales_per_month: f64,
    /// Days until the stock runs out; `None` when consumption is zero
    pub days_to_stockout: Option<f64>,
    /// Risk band
    pub band: StockBand,
}

/// Turnover for every item issued during a window of `months` 30-day months,
/// highest ratio first (ties by id).
#[must_use]
pub fn turnover(items: &[ItemHistory], months: f64) -> Vec<TurnoverEntry> {
    let mut entries: Vec<TurnoverEntry> = items
        .iter()
        .filter(|item| item.total_issued > 0.0)
        .map(|item| {
            let avg_stock = item.quantity + item.total_issued / 2.0;
            let sales_per_month = ratio(item.total_issued, months);
            let days_to_stockout =
                (sales_per_month > 0.0).then(|| round_to(item.quantity / sales_per_month * 30.0, 1));
            TurnoverEntry {
                item_id: item.item_id,
                name: item.name.clone(),
                current_stock: item.quantity,
                total_issued: item.total_issued,
                avg_stock: round_to(avg_stock, 2),
                turnover_ratio: round_to(ratio(item.total_issued, avg_stock), 3),
                sales_per_month: round_to(sales_per_month, 2),
                days_to_stockout,
                band: StockBand::from_days(days_to_stockout),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.turnover_ratio
            .partial_cmp(&a.turnover_ratio)
            .unwrap_or(Ordering::Equal)
            .then(a.item_id.cmp(&b.item_id))
    });
    entries
}

/// Unit margin of one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginRow {
    /// Item id
    pub item_id: i64,
    /// Item name
    pub name: String,
    /// Quantity on hand
    pub quantity: f64,
    /// Unit purchase price
    pub price_purchase: Decimal,
    /// Unit sale price
    pub price_sale: Decimal,
    /// `price_sale - price_purchase`, may be negative
    pub margin_unit: Decimal,
    /// Margin over purchase price in percent; `None` when the purchase price is zero
    pub margin_pct: Option<f64>,
}

/// Margin table plus stock-weighted totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginAnalysis {
    /// One row per item, by id
    pub rows: Vec<MarginRow>,
    /// Σ quantity × purchase price
    pub total_purchase_value: Decimal,
    /// Σ quantity × sale price
    pub total_sale_value: Decimal,
    /// `total_sale_value - total_purchase_value`
    pub total_margin: Decimal,
    /// Margin over purchase value in percent, items without a purchase price excluded
    pub weighted_margin_pct: f64,
    /// Items selling below purchase price
    pub negative_margin_items: usize,
}

/// Unit and stock-weighted margins.
#[must_use]
pub fn margin_analysis(items: &[ItemHistory]) -> MarginAnalysis {
    let mut purchase_values = Vec::with_capacity(items.len());
    let mut sale_values = Vec::with_capacity(items.len());
    let mut weighted_purchase = Vec::new();
    let mut weighted_sale = Vec::new();

    let rows: Vec<MarginRow> = items
        .iter()
        .map(|item| {
            let quantity = Decimal::from_f64(item.quantity).unwrap_or_default();
            let purchase_value = quantity * item.price_purchase;
            let sale_value = quantity * item.price_sale;
            purchase_values.push(purchase_value);
            sale_values.push(sale_value);

            let priced = item.price_purchase > Decimal::ZERO;
            if priced {
                weighted_purchase.push(purchase_value);
                weighted_sale.push(sale_value);
            }

            let margin_unit = item.price_sale - item.price_purchase;
            MarginRow {
                item_id: item.item_id,
                name: item.name.clone(),
                quantity: item.quantity,
                price_purchase: item.price_purchase,
                price_sale: item.price_sale,
                margin_unit,
                margin_pct: priced.then(|| {
                    round_to(
                        ratio(
                            numeric::to_f64(margin_unit),
                            numeric::to_f64(item.price_purchase),
                        ) * 100.0,
                        2,
                    )
                }),
            }
        })
        .collect();

    let total_purchase_value = sum_money(&purchase_values);
    let total_sale_value = sum_money(&sale_values);
    let weighted_cost = numeric::to_f64(sum_money(&weighted_purchase));
    let weighted_margin = numeric::to_f64(sum_money(&weighted_sale)) - weighted_cost;

    MarginAnalysis {
        negative_margin_items: rows
            .iter()
            .filter(|row| row.margin_unit < Decimal::ZERO)
            .count(),
        rows,
        total_purchase_value,
        total_sale_value,
        total_margin: total_sale_value - total_purchase_value,
        weighted_margin_pct: round_to(ratio(weighted_margin, weighted_cost) * 100.0, 2),
    }
}

/// One item without recent movement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadStockEntry {
    /// Item id
    pub item_id: i64,
    /// Item name
    pub name: String,
    /// Quantity on hand
    pub quantity: f64,
    /// `quantity × price_purchase`
    pub value: Decimal,
    /// Most recent movement, `None` if the item never moved
    pub last_movement_date: Option<NaiveDate>,
    /// Days since the last movement
    pub days_idle: Option<i64>,
}

/// Dead items and their tied-up value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadStockReport {
    /// Stalest first; never-moved items lead
    pub entries: Vec<DeadStockEntry>,
    /// Σ value
    pub total_value: Decimal,
}

/// Items in stock whose last movement is older than `threshold_days` or
/// that never moved.
#[must_use]
pub fn dead_stock(items: &[ItemHistory], today: NaiveDate, threshold_days: i64) -> DeadStockReport {
    let mut entries: Vec<DeadStockEntry> = items
        .iter()
        .filter(|item| item.quantity > 0.0)
        .filter_map(|item| {
            let days_idle = item
                .last_movement_date
                .map(|last| (today - last).num_days());
            if days_idle.is_some_and(|days| days <= threshold_days) {
                return None;
            }
            let quantity = Decimal::from_f64(item.quantity).unwrap_or_default();
            Some(DeadStockEntry {
                item_id: item.item_id,
                name: item.name.clone(),
                quantity: item.quantity,
                value: numeric::rescale(quantity * item.price_purchase, numeric::MONEY_SCALE),
                last_movement_date: item.last_movement_date,
                days_idle,
            })
        })
        .collect();

    // Option orders None first, then oldest date
    entries.sort_by(|a, b| {
        a.last_movement_date
            .cmp(&b.last_movement_date)
            .then(a.item_id.cmp(&b.item_id))
    });

    DeadStockReport {
        total_value: sum_money(entries.iter().map(|entry| &entry.value)),
        entries,
    }
}

/// Stock status against predicted consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Stock below predicted consumption
    Critical,
    /// Covers consumption but not the safety minimum
    Warn,
    /// Covers consumption and minimum
    Ok,
}

impl PurchaseStatus {
    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warn => "warn",
            Self::Ok => "ok",
        }
    }
}

/// Purchase suggestion for one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecommendation {
    /// Item id
    pub item_id: i64,
    /// Item name
    pub name: String,
    /// Supplier name
    pub supplier: Option<String>,
    /// Quantity on hand
    pub current_stock: f64,
    /// Reorder threshold
    pub min_quantity: f64,
    /// Average daily issue over the lookback window
    pub consumption_per_day: f64,
    /// Expected issue over the horizon
    pub predicted_consumption: f64,
    /// Quantity to order, never negative
    pub recommended_purchase: f64,
    /// `recommended_purchase × price_purchase`
    pub estimated_cost: Decimal,
    /// Stock status
    pub status: PurchaseStatus,
}

/// Recommends purchases from consumption over the last `lookback_days`.
///
/// # Arguments
/// * `items` - Item history over the lookback window
/// * `lookback_days` - Length of that window
/// * `horizon_days` - How far ahead to cover consumption
///
/// # Returns
/// Critical items first, then by recommended quantity descending and id.
#[must_use]
pub fn purchase_recommendations(
    items: &[ItemHistory],
    lookback_days: u32,
    horizon_days: u32,
) -> Vec<PurchaseRecommendation> {
    let mut recommendations: Vec<PurchaseRecommendation> = items
        .iter()
        .filter(|item| item.total_issued > 0.0)
        .map(|item| {
            let consumption_per_day = ratio(item.total_issued, f64::from(lookback_days));
            let predicted = consumption_per_day * f64::from(horizon_days);
            let recommended = (predicted - item.quantity + item.min_quantity).max(0.0);
            let status = if item.quantity >= predicted + item.min_quantity {
                PurchaseStatus::Ok
            } else if item.quantity >= predicted {
                PurchaseStatus::Warn
            } else {
                PurchaseStatus::Critical
            };
            let recommended = round_to(recommended, 2);
            PurchaseRecommendation {
                item_id: item.item_id,
                name: item.name.clone(),
                supplier: item.supplier.clone(),
                current_stock: item.quantity,
                min_quantity: item.min_quantity,
                consumption_per_day: round_to(consumption_per_day, 3),
                predicted_consumption: round_to(predicted, 2),
                recommended_purchase: recommended,
                estimated_cost: numeric::rescale(
                    Decimal::from_f64(recommended).unwrap_or_default() * item.price_purchase,
                    numeric::MONEY_SCALE,
                ),
                status,
            }
        })
        .collect();

    recommendations.sort_by(|a, b| {
        a.status
            .cmp(&b.status)
            .then(
                b.recommended_purchase
                    .partial_cmp(&a.recommended_purchase)
                    .unwrap_or(Ordering::Equal),
            )
            .then(a.item_id.cmp(&b.item_id))
    });
    recommendations
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::date;

    fn item(id: i64, quantity: f64, issued: f64, price: f64) -> ItemHistory {
        ItemHistory {
            item_id: id,
            name: format!("item {id}"),
            category: None,
            supplier: None,
            quantity,
            min_quantity: 0.0,
            price_purchase: numeric::money(price),
            price_sale: numeric::money(price * 1.5),
            total_issued: issued,
            total_received: 0.0,
            issued_value: numeric::money(issued * price),
            last_movement_date: None,
        }
    }

    #[test]
    fn test_abc_tiny_set() {
        let items = [item(1, 0.0, 10.0, 100.0), item(2, 0.0, 5.0, 20.0), item(3, 0.0, 1.0, 10.0)];
        let abc = abc_classification(&items);

        let classes: Vec<(i64, AbcClass)> = abc.iter().map(|e| (e.item_id, e.class)).collect();
        assert_eq!(classes, [(1, AbcClass::A), (2, AbcClass::B), (3, AbcClass::C)]);
        assert_eq!(abc[0].value.to_string(), "1000.00");
        assert_eq!(abc[0].cumulative_pct, 90.09);
        assert_eq!(abc[1].cumulative_pct, 99.1);
        assert_eq!(abc[2].cumulative_pct, 100.0);
    }

    #[test]
    fn test_abc_values_issues_at_purchase_price() {
        let mut cheap_movements = item(1, 0.0, 4.0, 100.0);
        cheap_movements.issued_value = Decimal::ZERO;
        let mut priced_movements = item(2, 0.0, 2.0, 50.0);
        priced_movements.issued_value = numeric::money(5000.0);

        let abc = abc_classification(&[cheap_movements, priced_movements]);

        assert_eq!(abc[0].item_id, 1);
        assert_eq!(abc[0].value, numeric::money(400.0));
        assert_eq!(abc[1].value, numeric::money(100.0));
    }

    #[test]
    fn test_abc_ties_by_id_and_cumulative_monotone() {
        let items = [
            item(5, 0.0, 1.0, 50.0),
            item(2, 0.0, 1.0, 50.0),
            item(9, 0.0, 0.0, 50.0),
            item(4, 0.0, 2.0, 10.0),
        ];
        let abc = abc_classification(&items);

        assert_eq!(abc.iter().map(|e| e.item_id).collect::<Vec<_>>(), [2, 5, 4]);
        assert!(abc.windows(2).all(|w| w[0].cumulative_pct <= w[1].cumulative_pct));
        assert!(abc_classification(&[]).is_empty());
    }

    #[test]
    fn test_turnover_warning_band() {
        let entries = turnover(&[item(1, 30.0, 120.0, 10.0)], 6.0);
        let entry = &entries[0];
        assert_eq!(entry.avg_stock, 90.0);
        assert_eq!(entry.turnover_ratio, 1.333);
        assert_eq!(entry.sales_per_month, 20.0);
        assert_eq!(entry.days_to_stockout, Some(45.0));
        assert_eq!(entry.band, StockBand::Warning);
    }

    #[test]
    fn test_turnover_skips_unissued_and_guards_zero_months() {
        assert!(turnover(&[item(1, 30.0, 0.0, 10.0)], 6.0).is_empty());

        let entries = turnover(&[item(1, 30.0, 10.0, 10.0)], 0.0);
        assert_eq!(entries[0].sales_per_month, 0.0);
        assert_eq!(entries[0].days_to_stockout, None);
        assert_eq!(entries[0].band, StockBand::Ok);
    }

    #[test]
    fn test_margin_unit_exact_and_zero_purchase_excluded() {
        let mut free = item(2, 10.0, 0.0, 0.0);
        free.price_sale = numeric::money(50.0);
        let mut loss = item(3, 1.0, 0.0, 100.0);
        loss.price_sale = numeric::money(90.0);
        let items = [item(1, 2.0, 0.0, 100.0), free, loss];

        let analysis = margin_analysis(&items);
        for (row, source) in analysis.rows.iter().zip(&items) {
            assert_eq!(row.margin_unit, source.price_sale - source.price_purchase);
        }
        assert_eq!(analysis.rows[0].margin_pct, Some(50.0));
        assert_eq!(analysis.rows[1].margin_pct, None);
        assert_eq!(analysis.negative_margin_items, 1);
        // Priced items: cost 300, sale 390
        assert_eq!(analysis.weighted_margin_pct, 30.0);
    }

    #[test]
    fn test_dead_stock_threshold() {
        let today = date(2024, 6, 30);
        let mut stale = item(1, 5.0, 0.0, 200.0);
        stale.last_movement_date = Some(today - chrono::Days::new(200));
        let mut fresh = item(2, 5.0, 0.0, 200.0);
        fresh.last_movement_date = Some(today - chrono::Days::new(30));
        let never = item(3, 1.0, 0.0, 10.0);
        let empty = item(4, 0.0, 0.0, 10.0);

        let report = dead_stock(&[stale, fresh, never, empty], today, 180);
        let ids: Vec<i64> = report.entries.iter().map(|e| e.item_id).collect();
        assert_eq!(ids, [3, 1]);
        assert_eq!(report.entries[1].value.to_string(), "1000.00");
        assert_eq!(report.entries[1].days_idle, Some(200));
        assert_eq!(report.total_value.to_string(), "1010.00");
    }

    #[test]
    fn test_purchase_recommendations() {
        let mut low = item(1, 5.0, 90.0, 10.0);
        low.min_quantity = 2.0;
        let mut mid = item(2, 32.0, 90.0, 10.0);
        mid.min_quantity = 5.0;
        let plenty = item(3, 100.0, 90.0, 10.0);

        let recs = purchase_recommendations(&[plenty, mid, low], 90, 30);
        let statuses: Vec<(i64, PurchaseStatus)> = recs.iter().map(|r| (r.item_id, r.status)).collect();
        assert_eq!(
            statuses,
            [(1, PurchaseStatus::Critical), (2, PurchaseStatus::Warn), (3, PurchaseStatus::Ok)]
        );
        // 1/day × 30 - 5 + 2
        assert_eq!(recs[0].recommended_purchase, 27.0);
        assert_eq!(recs[0].estimated_cost.to_string(), "270.00");
        assert!(recs.iter().all(|r| r.recommended_purchase >= 0.0));
    }
}
