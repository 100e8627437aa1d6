//! Report Document Builder.
//!
//! Turns a [`ViewSnapshot`] into a format-agnostic [`ReportDocument`]: a
//! header and an ordered list of sections made of key/value tables, tabular
//! data and chart series. Labels and number formatting (Czech conventions:
//! space as thousands separator, decimal comma, `Kč`, `%`, `h`) are fixed
//! here so every serializer prints the same text.

use crate::core::kpi::Severity;
use crate::core::numeric::{self, finite};
use crate::core::snapshot::{
    Alert, Block, Cell, MetricCard, MetricValue, Section, SectionStatus, Series, Table,
    ViewSnapshot,
};
use crate::errors::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Periodic report variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Previous calendar month
    Monthly,
    /// Previous calendar quarter
    Quarterly,
    /// Previous calendar year
    Yearly,
    /// Caller-supplied range
    Custom,
}

impl ReportKind {
    /// Every kind
    pub const ALL: [Self; 4] = [Self::Monthly, Self::Quarterly, Self::Yearly, Self::Custom];

    /// Machine key, the suffix of the `report.*` view name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }

    /// Document title
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Monthly => "Měsíční report",
            Self::Quarterly => "Čtvrtletní report",
            Self::Yearly => "Roční report",
            Self::Custom => "Report za období",
        }
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownView {
                name: format!("report.{s}"),
            })
    }
}

/// Document header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportHeader {
    /// Title
    pub title: String,
    /// Period in display form
    pub period: String,
    /// When the document was generated, supplied by the caller
    pub generated_at: NaiveDateTime,
}

/// One labelled chart point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Bucket label
    pub label: String,
    /// Raw value
    pub value: f64,
}

/// Typed content of a report section
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportBlock {
    /// Label / formatted value pairs
    KeyValueTable {
        /// Caption
        title: String,
        /// Rows in display order
        rows: Vec<(String, String)>,
    },
    /// Formatted table
    TabularData {
        /// Caption
        title: String,
        /// Column labels
        headers: Vec<String>,
        /// Formatted cells
        rows: Vec<Vec<String>>,
    },
    /// Series for a chart
    ChartSeries {
        /// Caption
        title: String,
        /// Points in bucket order
        points: Vec<ChartPoint>,
    },
}

/// One section of the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    /// Key of the snapshot section
    pub key: String,
    /// Display title
    pub title: String,
    /// Blocks in display order
    pub blocks: Vec<ReportBlock>,
}

/// A complete report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    /// Header block
    pub header: ReportHeader,
    /// Non-empty sections in snapshot order
    pub sections: Vec<ReportSection>,
}

const LABELS: &[(&str, &str)] = &[
    // sections
    ("summary", "Souhrn"),
    ("overview", "Přehled"),
    ("orders", "Zakázky"),
    ("mechanics", "Mechanici"),
    ("warehouse", "Sklad"),
    ("stock", "Sklad"),
    ("kpi", "KPI"),
    ("trend", "Vývoj"),
    ("targets", "Cíle"),
    ("revenue_trend", "Vývoj tržeb"),
    ("order_types", "Typy zakázek"),
    ("orders_by_type", "Zakázky podle typu"),
    ("orders_by_status", "Zakázky podle stavu"),
    ("workload", "Vytížení mechaniků"),
    ("abc", "ABC analýza"),
    ("forecast", "Predikce"),
    ("seasonality", "Sezónnost"),
    ("data_quality", "Kvalita dat"),
    // metrics and columns
    ("revenue", "Tržby"),
    ("material_cost", "Materiál"),
    ("labor_cost", "Práce"),
    ("gross_profit", "Hrubý zisk"),
    ("net_profit", "Čistý zisk"),
    ("gross_margin", "Hrubá marže"),
    ("net_margin", "Čistá marže"),
    ("avg_order_value", "Průměrná zakázka"),
    ("median_order_value", "Medián zakázky"),
    ("hours", "Odpracované hodiny"),
    ("utilization", "Vytížení"),
    ("utilization_pct", "Vytížení"),
    ("scheduled_events", "Plánované termíny"),
    ("stock_purchase_value", "Hodnota skladu (nákup)"),
    ("stock_sale_value", "Hodnota skladu (prodej)"),
    ("stock_potential_margin", "Potenciální marže"),
    ("items", "Položky"),
    ("items_below_min", "Pod minimem"),
    ("class_A", "Třída A"),
    ("class_B", "Třída B"),
    ("class_C", "Třída C"),
    ("order_type", "Typ"),
    ("status", "Stav"),
    ("full_name", "Jméno"),
    ("name", "Název"),
    ("value", "Hodnota"),
    ("share_pct", "Podíl"),
    ("cumulative_pct", "Kumulativně"),
    ("class", "Třída"),
    ("actual", "Skutečnost"),
    ("target", "Cíl"),
    ("progress_pct", "Plnění"),
    ("severity", "Závažnost"),
    ("monthly_revenue", "Měsíční tržby"),
    ("monthly_orders", "Počet zakázek"),
    ("mechanic_utilization", "Vytížení mechaniků"),
    ("margin_target", "Marže"),
    ("customer_satisfaction", "Spokojenost zákazníků"),
];

/// Display label of a machine key; unknown keys are shown as they are.
#[must_use]
pub fn label(key: &str) -> String {
    LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map_or_else(|| key.to_string(), |(_, text)| (*text).to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    grouped
}

/// Formats a decimal at `dp` places, e.g. `-12 345,50`.
#[must_use]
pub fn format_decimal(value: Decimal, dp: u32) -> String {
    let rounded = numeric::rescale(value, dp);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = rounded.abs().to_string();
    match text.split_once('.') {
        Some((whole, fraction)) => format!("{sign}{},{fraction}", group_thousands(whole)),
        None => format!("{sign}{}", group_thousands(&text)),
    }
}

/// Formats a real number at `dp` places.
#[must_use]
pub fn format_number(value: f64, dp: u32) -> String {
    format_decimal(Decimal::from_f64(finite(value)).unwrap_or_default(), dp)
}

/// `1 234,50 Kč`
#[must_use]
pub fn format_money(value: Decimal) -> String {
    format!("{} Kč", format_decimal(value, numeric::MONEY_SCALE))
}

/// `12,5 %`
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{} %", format_number(value, 1))
}

/// `14,5 h`
#[must_use]
pub fn format_hours(value: Decimal) -> String {
    format!("{} h", format_decimal(value, numeric::HOURS_SCALE))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

const fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "v pořádku",
        Severity::Warn => "varování",
        Severity::Critical => "kritické",
    }
}

fn format_metric(card: &MetricCard) -> String {
    let value = match &card.value {
        MetricValue::Money(value) => format_money(*value),
        MetricValue::Count(value) => format_decimal(Decimal::from(*value), 0),
        MetricValue::Hours(value) => format_hours(*value),
        MetricValue::Percent(value) => format_percent(*value),
        MetricValue::Number(value) => format_number(*value, 2),
        MetricValue::Text(value) => value.clone(),
    };
    match card.trend {
        Some(trend) if trend > 0.0 => format!("{value} (+{})", format_percent(trend)),
        Some(trend) => format!("{value} ({})", format_percent(trend)),
        None => value,
    }
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text(text) => text.clone(),
        Cell::Integer(value) => format_decimal(Decimal::from(*value), 0),
        Cell::Number(value) => format_number(*value, 2),
        Cell::Money(value) => format_money(*value),
        Cell::Percent(value) => format_percent(*value),
        Cell::Hours(value) => format_hours(*value),
        Cell::Date(date) => format_date(*date),
        Cell::Empty => String::new(),
    }
}

fn metrics_block(title: &str, cards: &[MetricCard]) -> Option<ReportBlock> {
    (!cards.is_empty()).then(|| ReportBlock::KeyValueTable {
        title: title.to_string(),
        rows: cards
            .iter()
            .map(|card| (label(&card.key), format_metric(card)))
            .collect(),
    })
}

fn table_block(table: &Table) -> Option<ReportBlock> {
    (!table.rows.is_empty()).then(|| ReportBlock::TabularData {
        title: label(&table.name),
        headers: table.headers.iter().map(|header| label(header)).collect(),
        rows: table
            .rows
            .iter()
            .map(|row| row.iter().map(format_cell).collect())
            .collect(),
    })
}

fn series_block(series: &Series) -> Option<ReportBlock> {
    (!series.points.is_empty()).then(|| ReportBlock::ChartSeries {
        title: label(&series.name),
        points: series
            .points
            .iter()
            .map(|point| ChartPoint {
                label: point.label.clone(),
                value: point.value,
            })
            .collect(),
    })
}

fn alerts_block(alerts: &[Alert]) -> Option<ReportBlock> {
    (!alerts.is_empty()).then(|| ReportBlock::TabularData {
        title: "Upozornění".to_string(),
        headers: vec!["KPI".to_string(), label("severity"), "Doporučení".to_string()],
        rows: alerts
            .iter()
            .map(|alert| {
                vec![
                    label(&alert.kpi),
                    severity_label(alert.severity).to_string(),
                    alert.message.clone(),
                ]
            })
            .collect(),
    })
}

fn note(title: &str, key: &str, message: &str) -> ReportBlock {
    ReportBlock::KeyValueTable {
        title: title.to_string(),
        rows: vec![(key.to_string(), message.to_string())],
    }
}

/// Converts one snapshot section; `None` when there is nothing to show.
fn convert_section(section: &Section) -> Option<ReportSection> {
    let title = label(&section.key);
    let mut blocks = Vec::new();
    match &section.status {
        SectionStatus::Error(message) => blocks.push(note(&title, "Chyba", message)),
        SectionStatus::Warning(message) => blocks.push(note(&title, "Upozornění", message)),
        SectionStatus::Ok => {}
    }
    if !matches!(section.status, SectionStatus::Error(_)) {
        blocks.extend(section.blocks.iter().filter_map(|block| match block {
            Block::Metrics(cards) => metrics_block(&title, cards),
            Block::Series(series) => series_block(series),
            Block::Table(table) => table_block(table),
            Block::Alerts(alerts) => alerts_block(alerts),
        }));
    }
    (!blocks.is_empty()).then(|| ReportSection {
        key: section.key.clone(),
        title,
        blocks,
    })
}

fn document_title(view: &str) -> String {
    match view.strip_prefix("report.").map(str::parse::<ReportKind>) {
        Some(Ok(kind)) => kind.title().to_string(),
        _ if view == "dashboard" => "Manažerský přehled".to_string(),
        _ => format!("Přehled {view}"),
    }
}

impl ReportDocument {
    /// Builds the document of a snapshot.
    ///
    /// # Arguments
    /// * `snapshot` - The composed view
    /// * `generated_at` - Timestamp printed in the header
    ///
    /// # Returns
    /// Sections in snapshot order without the empty ones, followed by a
    /// data-quality note when the snapshot raised a flag.
    #[must_use]
    pub fn from_snapshot(snapshot: &ViewSnapshot, generated_at: NaiveDateTime) -> Self {
        let mut sections: Vec<ReportSection> =
            snapshot.sections.iter().filter_map(convert_section).collect();

        let mut notes = Vec::new();
        if snapshot.flags.negative_stock_movement {
            notes.push((
                "Záporný pohyb skladu".to_string(),
                "součet pohybů je záporný".to_string(),
            ));
        }
        if snapshot.flags.negative_unit_margin {
            notes.push((
                "Záporná marže".to_string(),
                "některé položky se prodávají pod nákupní cenou".to_string(),
            ));
        }
        if !notes.is_empty() {
            let title = label("data_quality");
            sections.push(ReportSection {
                key: "data_quality".to_string(),
                blocks: vec![ReportBlock::KeyValueTable {
                    title: title.clone(),
                    rows: notes,
                }],
                title,
            });
        }

        Self {
            header: ReportHeader {
                title: document_title(&snapshot.view),
                period: format!(
                    "{} - {}",
                    format_date(snapshot.period.from()),
                    format_date(snapshot.period.to())
                ),
                generated_at,
            },
            sections,
        }
    }

    /// JSON encoding of the document tree.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| Error::Serialize { source })
    }

    /// Plain-text preview.
    #[must_use]
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReportDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header.title)?;
        writeln!(f, "Období: {}", self.header.period)?;
        writeln!(
            f,
            "Vygenerováno: {}",
            self.header.generated_at.format("%d.%m.%Y %H:%M")
        )?;

        for section in &self.sections {
            writeln!(f, "\n== {} ==", section.title)?;
            for block in &section.blocks {
                write!(f, "{block}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ReportBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyValueTable { rows, .. } => {
                for (key, value) in rows {
                    writeln!(f, "{key}: {value}")?;
                }
            }
            Self::TabularData {
                title,
                headers,
                rows,
            } => {
                writeln!(f, "{title}")?;
                writeln!(f, "  {}", headers.join(" | "))?;
                for row in rows {
                    writeln!(f, "  {}", row.join(" | "))?;
                }
            }
            Self::ChartSeries { title, points } => {
                writeln!(f, "{title}")?;
                let max = points.iter().map(|point| point.value).fold(0.0, f64::max);
                for point in points {
                    let share = numeric::ratio(point.value, max) * 100.0;
                    writeln!(
                        f,
                        "  {:<12} {} {}",
                        point.label,
                        format_bar(share, 20),
                        format_number(point.value, 2)
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Text bar like `[████████░░]` for a share in percent of the longest bar.
#[must_use]
pub fn format_bar(share_pct: f64, bar_length: usize) -> String {
    let clamped = finite(share_pct).clamp(0.0, 100.0);

    // clamped ∈ [0, 100] and the bar is short, so the product fits a usize
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped / 100.0) * bar_length as f64).round() as usize;
    let empty = bar_length.saturating_sub(filled);

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::period::{Granularity, Period};
    use crate::core::snapshot::SnapshotFlags;
    use crate::test_utils::date;

    fn generated_at() -> NaiveDateTime {
        date(2024, 4, 1).and_hms_opt(8, 30, 0).unwrap()
    }

    fn snapshot(sections: Vec<Section>) -> ViewSnapshot {
        ViewSnapshot {
            view: "report.monthly".to_string(),
            period: Period::new(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day).unwrap(),
            as_of: date(2024, 4, 1),
            sections,
            flags: SnapshotFlags::default(),
        }
    }

    #[test]
    fn test_czech_number_formatting() {
        assert_eq!(format_money(Decimal::new(123_456_750, 2)), "1 234 567,50 Kč");
        assert_eq!(format_money(Decimal::from(-1500)), "-1 500,00 Kč");
        assert_eq!(format_money(Decimal::from(12)), "12,00 Kč");
        assert_eq!(format_percent(12.34), "12,3 %");
        assert_eq!(format_hours(Decimal::new(145, 1)), "14,5 h");
        assert_eq!(format_decimal(Decimal::from(1_000_000), 0), "1 000 000");
        assert_eq!(format_number(f64::NAN, 2), "0,00");
    }

    #[test]
    fn test_report_kind_names() {
        for kind in ReportKind::ALL {
            assert_eq!(kind.as_str().parse::<ReportKind>().unwrap(), kind);
        }
        assert!(matches!(
            "weekly".parse::<ReportKind>(),
            Err(Error::UnknownView { name }) if name == "report.weekly"
        ));
    }

    #[test]
    fn test_format_bar() {
        assert_eq!(format_bar(50.0, 10), "[█████░░░░░]");
        assert_eq!(format_bar(150.0, 4), "[████]");
        assert_eq!(format_bar(-5.0, 4), "[░░░░]");
    }

    #[test]
    fn test_document_skips_empty_and_notes_errors() {
        let summary = Section::new("summary").metrics(vec![
            MetricCard::new("revenue", MetricValue::Money(Decimal::new(750_000, 2)))
                .with_trend(Some(12.5)),
            MetricCard::new("orders", MetricValue::Count(3)),
        ]);
        let empty = Section::new("mechanics").table(Table::new("workload", &["user_id"]));
        let failed = Section::error("warehouse", "Storage error: disk I/O");

        let document =
            ReportDocument::from_snapshot(&snapshot(vec![summary, empty, failed]), generated_at());

        assert_eq!(document.header.title, "Měsíční report");
        assert_eq!(document.header.period, "01.03.2024 - 31.03.2024");
        let keys: Vec<&str> = document.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["summary", "warehouse"]);

        assert_eq!(
            document.sections[0].blocks[0],
            ReportBlock::KeyValueTable {
                title: "Souhrn".to_string(),
                rows: vec![
                    ("Tržby".to_string(), "7 500,00 Kč (+12,5 %)".to_string()),
                    ("Zakázky".to_string(), "3".to_string()),
                ],
            }
        );
        assert_eq!(
            document.sections[1].blocks,
            [note("Sklad", "Chyba", "Storage error: disk I/O")]
        );
    }

    #[test]
    fn test_flags_add_data_quality_section() {
        let mut snapshot = snapshot(vec![]);
        snapshot.flags.negative_unit_margin = true;
        let document = ReportDocument::from_snapshot(&snapshot, generated_at());

        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0].title, "Kvalita dat");
    }

    #[test]
    fn test_render_text_and_json() {
        let mut table = Table::new("orders_by_status", &["status", "orders"]);
        table.push(vec![Cell::text("completed"), Cell::count(1200)]);
        let trend = Series {
            name: "revenue".to_string(),
            points: vec![],
        };
        let section = Section::new("orders").table(table).series(trend);
        let document = ReportDocument::from_snapshot(&snapshot(vec![section]), generated_at());

        let text = document.render_text();
        assert_eq!(text, document.to_string());
        assert!(text.starts_with("Měsíční report\nObdobí: 01.03.2024 - 31.03.2024\n"));
        assert!(text.contains("Vygenerováno: 01.04.2024 08:30"));
        assert!(text.contains("== Zakázky =="));
        assert!(text.contains("  Stav | Zakázky\n  completed | 1 200\n"));
        // The empty series is dropped
        assert_eq!(document.sections[0].blocks.len(), 1);

        let json: serde_json::Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        assert_eq!(json["sections"][0]["blocks"][0]["kind"], "tabular_data");
        assert_eq!(json["header"]["generated_at"], "2024-04-01T08:30:00");
    }

    #[test]
    fn test_chart_block_renders_bars() {
        let block = ReportBlock::ChartSeries {
            title: "Tržby".to_string(),
            points: vec![
                ChartPoint {
                    label: "2024-01".to_string(),
                    value: 100.0,
                },
                ChartPoint {
                    label: "2024-02".to_string(),
                    value: 200.0,
                },
            ],
        };

        let text = block.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Tržby");
        assert_eq!(lines[1], format!("  2024-01      {} 100,00", format_bar(50.0, 20)));
        assert_eq!(lines[2], format!("  2024-02      {} 200,00", format_bar(100.0, 20)));
    }
}
