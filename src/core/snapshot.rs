//! `ViewSnapshot` - the immutable result of one view computation.
//!
//! A snapshot is a list of independent sections, each with a status and
//! typed blocks. Blocks are tagged variants so renderers match exhaustively.
//! Snapshots hold no wall-clock time, so two computations over the same data
//! serialize to identical bytes.

use crate::core::kpi::Severity;
use crate::core::period::{Bucket, Period};
use crate::errors::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum SectionStatus {
    /// Fully computed
    Ok,
    /// Computed in a degraded way
    Warning(String),
    /// Not computed; blocks are empty
    Error(String),
}

/// Typed numeric value of a metric card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    /// Money at two decimals
    Money(Decimal),
    /// Whole count
    Count(u64),
    /// Hours at one decimal
    Hours(Decimal),
    /// Percentage
    Percent(f64),
    /// Dimensionless number
    Number(f64),
    /// Machine key (status, class)
    Text(String),
}

/// Direction of a trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Increased
    Up,
    /// Decreased
    Down,
    /// Unchanged
    Flat,
}

impl Direction {
    /// Direction of a percent change.
    #[must_use]
    pub fn of(change: f64) -> Self {
        if change > 0.0 {
            Self::Up
        } else if change < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

/// One headline number
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    /// Machine key, e.g. `revenue`
    pub key: String,
    /// Value
    pub value: MetricValue,
    /// Percent change against the previous period
    pub trend: Option<f64>,
    /// Direction of `trend`
    pub direction: Option<Direction>,
}

impl MetricCard {
    /// Card without a trend.
    pub fn new(key: impl Into<String>, value: MetricValue) -> Self {
        Self {
            key: key.into(),
            value,
            trend: None,
            direction: None,
        }
    }

    /// Adds a percent change; `None` leaves the card trendless.
    #[must_use]
    pub fn with_trend(mut self, trend: Option<f64>) -> Self {
        self.trend = trend;
        self.direction = trend.map(Direction::of);
        self
    }
}

/// One point of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Bucket key
    pub key: String,
    /// Display label
    pub label: String,
    /// Value
    pub value: f64,
}

/// Named ordered series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    /// Machine name
    pub name: String,
    /// Points in bucket order
    pub points: Vec<SeriesPoint>,
}

impl Series {
    /// Series over period buckets.
    pub fn from_buckets<'a, I>(name: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (&'a Bucket, f64)>,
    {
        Self {
            name: name.into(),
            points: points
                .into_iter()
                .map(|(bucket, value)| SeriesPoint {
                    key: bucket.key.clone(),
                    label: bucket.label.clone(),
                    value,
                })
                .collect(),
        }
    }

    /// Series from explicit keys, labels equal to keys.
    pub fn from_keys<I>(name: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self {
            name: name.into(),
            points: points
                .into_iter()
                .map(|(key, value)| SeriesPoint {
                    label: key.clone(),
                    key,
                    value,
                })
                .collect(),
        }
    }

    /// Values only
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }
}

/// One table cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    /// Free text or machine key
    Text(String),
    /// Whole number
    Integer(i64),
    /// Real number
    Number(f64),
    /// Money
    Money(Decimal),
    /// Percentage
    Percent(f64),
    /// Hours
    Hours(Decimal),
    /// Calendar date
    Date(NaiveDate),
    /// No value
    Empty,
}

impl Cell {
    /// Text cell
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Count cell
    #[must_use]
    pub fn count(value: u64) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }

    /// Optional text, empty when absent
    #[must_use]
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Empty, |text| Self::Text(text.to_string()))
    }

    /// Optional percentage, empty when absent
    #[must_use]
    pub fn opt_percent(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Percent)
    }

    /// Optional number, empty when absent
    #[must_use]
    pub fn opt_number(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }

    /// Optional date, empty when absent
    #[must_use]
    pub fn opt_date(value: Option<NaiveDate>) -> Self {
        value.map_or(Self::Empty, Self::Date)
    }
}

/// Named table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Machine name
    pub name: String,
    /// Column keys
    pub headers: Vec<String>,
    /// Rows, each as long as `headers`
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Empty table with the given headers.
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }
}

/// KPI alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// KPI (or other source) key
    pub kpi: String,
    /// Severity
    pub severity: Severity,
    /// Recommendation code
    pub code: String,
    /// Default message
    pub message: String,
}

/// One typed block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Block {
    /// Headline cards
    Metrics(Vec<MetricCard>),
    /// Chart series
    Series(Series),
    /// Table
    Table(Table),
    /// Ordered alerts
    Alerts(Vec<Alert>),
}

/// Independent part of a view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Machine key
    pub key: String,
    /// Outcome
    pub status: SectionStatus,
    /// Blocks in display order
    pub blocks: Vec<Block>,
}

impl Section {
    /// Empty successful section.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: SectionStatus::Ok,
            blocks: Vec::new(),
        }
    }

    /// Failed section carrying a diagnostic.
    pub fn error(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: SectionStatus::Error(message.into()),
            blocks: Vec::new(),
        }
    }

    /// Appends a block.
    #[must_use]
    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Appends metric cards.
    #[must_use]
    pub fn metrics(self, cards: Vec<MetricCard>) -> Self {
        self.block(Block::Metrics(cards))
    }

    /// Appends a series.
    #[must_use]
    pub fn series(self, series: Series) -> Self {
        self.block(Block::Series(series))
    }

    /// Appends a table.
    #[must_use]
    pub fn table(self, table: Table) -> Self {
        self.block(Block::Table(table))
    }

    /// Appends alerts.
    #[must_use]
    pub fn alerts(self, alerts: Vec<Alert>) -> Self {
        self.block(Block::Alerts(alerts))
    }

    /// Marks the section degraded.
    #[must_use]
    pub fn warn(mut self, message: impl Into<String>) -> Self {
        self.status = SectionStatus::Warning(message.into());
        self
    }

    /// Whether the section has no blocks with content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|block| match block {
            Block::Metrics(cards) => cards.is_empty(),
            Block::Series(series) => series.points.is_empty(),
            Block::Table(table) => table.rows.is_empty(),
            Block::Alerts(alerts) => alerts.is_empty(),
        })
    }
}

/// Data-quality flags raised while composing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotFlags {
    /// A movement aggregate summed to a negative quantity
    pub negative_stock_movement: bool,
    /// An item sells below its purchase price
    pub negative_unit_margin: bool,
}

/// The result of one view computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    /// View name as requested
    pub view: String,
    /// Resolved period
    pub period: Period,
    /// Reference date the view was computed for
    pub as_of: NaiveDate,
    /// Sections in declared order
    pub sections: Vec<Section>,
    /// Data-quality flags
    pub flags: SnapshotFlags,
}

impl ViewSnapshot {
    /// Section by key
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.key == key)
    }

    /// Metric card by key, searched across sections
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<&MetricCard> {
        self.blocks().find_map(|block| match block {
            Block::Metrics(cards) => cards.iter().find(|card| card.key == key),
            _ => None,
        })
    }

    /// Series by name
    #[must_use]
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.blocks().find_map(|block| match block {
            Block::Series(series) if series.name == name => Some(series),
            _ => None,
        })
    }

    /// Table by name
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.blocks().find_map(|block| match block {
            Block::Table(table) if table.name == name => Some(table),
            _ => None,
        })
    }

    /// Every alert in section order
    #[must_use]
    pub fn alerts(&self) -> Vec<&Alert> {
        self.blocks()
            .filter_map(|block| match block {
                Block::Alerts(alerts) => Some(alerts.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.sections.iter().flat_map(|section| section.blocks.iter())
    }

    /// Canonical JSON encoding.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| crate::errors::Error::Config {
            message: format!("Failed to encode snapshot: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::period::Granularity;
    use crate::test_utils::date;

    fn sample() -> ViewSnapshot {
        let mut table = Table::new("types", &["type", "count"]);
        table.push(vec![Cell::text("repair"), Cell::count(2)]);
        ViewSnapshot {
            view: "dashboard".to_string(),
            period: Period::new(date(2024, 3, 1), date(2024, 3, 31), Granularity::Day).unwrap(),
            as_of: date(2024, 3, 31),
            sections: vec![
                Section::new("overview")
                    .metrics(vec![
                        MetricCard::new("revenue", MetricValue::Money(Decimal::new(150_000, 2)))
                            .with_trend(Some(-12.5)),
                    ])
                    .table(table),
                Section::error("stock", "Storage error: disk I/O"),
            ],
            flags: SnapshotFlags::default(),
        }
    }

    #[test]
    fn test_accessors() {
        let snapshot = sample();
        assert_eq!(
            snapshot.metric("revenue").and_then(|m| m.direction),
            Some(Direction::Down)
        );
        assert_eq!(snapshot.table("types").map(|t| t.rows.len()), Some(1));
        assert!(matches!(
            snapshot.section("stock").map(|s| &s.status),
            Some(SectionStatus::Error(_))
        ));
        assert!(snapshot.section("stock").is_some_and(Section::is_empty));
    }

    #[test]
    fn test_json_shape() -> Result<()> {
        let json = sample().to_json()?;
        assert!(json.contains(r#""status":{"status":"error","message":"Storage error: disk I/O"}"#));
        assert!(json.contains(r#""value":{"unit":"money","value":"1500.00"}"#));
        assert!(json.contains(r#"{"type":"integer","value":2}"#));
        assert!(json.contains(r#""from":"2024-03-01""#));
        Ok(())
    }
}
