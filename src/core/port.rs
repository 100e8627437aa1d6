//! Data Access Port - the only way the analytics core reads the store.
//!
//! A [`Query`] carries its SQL, its bound parameters and a row descriptor
//! naming and typing every result column. The port decodes each column as
//! declared, so the kernel never sees loosely typed tuples. Dates come back
//! as ISO-8601 text and are parsed by [`Row::date`].

use crate::core::numeric;
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryResult, Statement, Value};
use std::fmt;
use tracing::{debug, instrument};

/// A primitive value crossing the port
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// 64-bit integer
    Integer(i64),
    /// Double precision real
    Real(f64),
    /// UTF-8 text, including ISO dates
    Text(String),
    /// SQL NULL
    Null,
}

impl SqlValue {
    fn to_sea_value(&self) -> Value {
        match self {
            Self::Integer(value) => Value::BigInt(Some(*value)),
            Self::Real(value) => Value::Double(Some(*value)),
            Self::Text(value) => Value::String(Some(Box::new(value.clone()))),
            Self::Null => Value::BigInt(None),
        }
    }

    /// ISO date parameter
    #[must_use]
    pub fn date(date: NaiveDate) -> Self {
        Self::Text(date.format("%Y-%m-%d").to_string())
    }

    /// Nullable integer parameter
    #[must_use]
    pub fn opt_integer(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }

    /// Nullable text parameter
    #[must_use]
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |text| Self::Text(text.to_string()))
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

/// Declared type of a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Decoded as `i64`
    Integer,
    /// Decoded as `f64`; integer storage values widen
    Real,
    /// Decoded as `String`
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
        })
    }
}

/// Named, typed result column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Name used by typed accessors
    pub name: &'static str,
    /// Declared type
    pub kind: ColumnKind,
}

impl Column {
    /// Integer column
    #[must_use]
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
        }
    }

    /// Real column
    #[must_use]
    pub const fn real(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Real,
        }
    }

    /// Text column
    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }
}

/// Ordered column list of a query result
pub type RowDescriptor = &'static [Column];

/// A registered read-only query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Registry name, used in diagnostics
    pub name: &'static str,
    /// Parameterized SQL (`?1`, `?2`, ...)
    pub sql: String,
    /// Bound parameters, positional
    pub params: Vec<SqlValue>,
    /// Result row descriptor
    pub columns: RowDescriptor,
}

/// One decoded result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    query: &'static str,
    columns: RowDescriptor,
    values: Vec<SqlValue>,
}

impl Row {
    /// Builds a row, checking the value count against the descriptor.
    ///
    /// # Errors
    /// Returns [`Error::Decode`] when the arity does not match.
    pub fn new(query: &'static str, columns: RowDescriptor, values: Vec<SqlValue>) -> Result<Self> {
        if values.len() != columns.len() {
            return Err(Error::Decode {
                query: query.to_string(),
                column: format!("<{} values>", values.len()),
                expected: format!("{} columns", columns.len()),
            });
        }
        Ok(Self {
            query,
            columns,
            values,
        })
    }

    /// Raw positional values
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    fn value(&self, name: &str) -> Result<&SqlValue> {
        self.columns
            .iter()
            .position(|column| column.name == name)
            .and_then(|index| self.values.get(index))
            .ok_or_else(|| self.decode_error(name, "declared column"))
    }

    fn decode_error(&self, column: &str, expected: &str) -> Error {
        Error::Decode {
            query: self.query.to_string(),
            column: column.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Nullable integer column
    pub fn opt_integer(&self, name: &str) -> Result<Option<i64>> {
        match self.value(name)? {
            SqlValue::Integer(value) => Ok(Some(*value)),
            SqlValue::Null => Ok(None),
            _ => Err(self.decode_error(name, "integer")),
        }
    }

    /// Integer column, NULL reads as zero
    pub fn integer(&self, name: &str) -> Result<i64> {
        Ok(self.opt_integer(name)?.unwrap_or(0))
    }

    /// Non-negative count column
    pub fn count(&self, name: &str) -> Result<u64> {
        Ok(u64::try_from(self.integer(name)?).unwrap_or(0))
    }

    /// Real column, NULL reads as zero
    pub fn real(&self, name: &str) -> Result<f64> {
        match self.value(name)? {
            SqlValue::Real(value) => Ok(numeric::finite(*value)),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Integer(value) => Ok(*value as f64),
            SqlValue::Null => Ok(0.0),
            SqlValue::Text(_) => Err(self.decode_error(name, "real")),
        }
    }

    /// Money column at two decimal places, NULL reads as zero
    pub fn money(&self, name: &str) -> Result<Decimal> {
        Ok(numeric::money(self.real(name)?))
    }

    /// Hours column at one decimal place, NULL reads as zero
    pub fn hours(&self, name: &str) -> Result<Decimal> {
        Ok(numeric::hours(self.real(name)?))
    }

    /// Nullable text column
    pub fn opt_text(&self, name: &str) -> Result<Option<String>> {
        match self.value(name)? {
            SqlValue::Text(value) => Ok(Some(value.clone())),
            SqlValue::Null => Ok(None),
            _ => Err(self.decode_error(name, "text")),
        }
    }

    /// Text column, NULL reads as empty
    pub fn text(&self, name: &str) -> Result<String> {
        Ok(self.opt_text(name)?.unwrap_or_default())
    }

    /// Nullable ISO date column (`YYYY-MM-DD`, optionally followed by a time)
    pub fn opt_date(&self, name: &str) -> Result<Option<NaiveDate>> {
        match self.opt_text(name)? {
            None => Ok(None),
            Some(text) => {
                let day = text.get(..10).unwrap_or(&text);
                NaiveDate::parse_from_str(day, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|_| self.decode_error(name, "ISO date"))
            }
        }
    }

    /// ISO date column
    pub fn date(&self, name: &str) -> Result<NaiveDate> {
        self.opt_date(name)?
            .ok_or_else(|| self.decode_error(name, "non-null ISO date"))
    }
}

/// Read-only query interface the analytics core is written against.
///
/// Implementations return an empty list when nothing matches and
/// [`Error::Storage`] on I/O or syntax failure; they never substitute zeros.
#[allow(async_fn_in_trait)]
pub trait DataAccessPort {
    /// Executes `query` and decodes its rows.
    async fn query(&self, query: &Query) -> Result<Vec<Row>>;
}

/// Production port over a `SeaORM` connection
#[derive(Debug, Clone)]
pub struct SeaOrmPort {
    db: DatabaseConnection,
}

impl SeaOrmPort {
    /// Wraps an open connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The wrapped connection
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl DataAccessPort for SeaOrmPort {
    #[instrument(skip(self, query), fields(query = query.name))]
    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let backend = self.db.get_database_backend();
        let values: Vec<Value> = query.params.iter().map(SqlValue::to_sea_value).collect();
        let statement = Statement::from_sql_and_values(backend, &query.sql, values);

        let results = self.db.query_all(statement).await?;
        debug!(rows = results.len(), "query returned");

        results
            .iter()
            .map(|result| decode_row(query, result))
            .collect()
    }
}

fn decode_row(query: &Query, result: &QueryResult) -> Result<Row> {
    let values = query
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| decode_column(query, result, index, *column))
        .collect::<Result<Vec<_>>>()?;
    Row::new(query.name, query.columns, values)
}

fn decode_column(
    query: &Query,
    result: &QueryResult,
    index: usize,
    column: Column,
) -> Result<SqlValue> {
    let decoded = match column.kind {
        ColumnKind::Integer => result
            .try_get_by_index::<Option<i64>>(index)
            .map(SqlValue::opt_integer),
        ColumnKind::Real => result
            .try_get_by_index::<Option<f64>>(index)
            .map(|value| value.map_or(SqlValue::Null, SqlValue::Real))
            .or_else(|_| {
                result
                    .try_get_by_index::<Option<i64>>(index)
                    .map(SqlValue::opt_integer)
            }),
        ColumnKind::Text => result
            .try_get_by_index::<Option<String>>(index)
            .map(|value| value.map_or(SqlValue::Null, SqlValue::Text)),
    };

    decoded.map_err(|_| Error::Decode {
        query: query.name.to_string(),
        column: column.name.to_string(),
        expected: column.kind.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::setup_test_db;

    const PROBE: RowDescriptor = &[
        Column::integer("n"),
        Column::real("x"),
        Column::text("t"),
        Column::text("d"),
    ];

    fn probe(sql: &str, params: Vec<SqlValue>) -> Query {
        Query {
            name: "probe",
            sql: sql.to_string(),
            params,
            columns: PROBE,
        }
    }

    #[tokio::test]
    async fn test_decodes_declared_columns() -> Result<()> {
        let port = SeaOrmPort::new(setup_test_db().await?);
        let rows = port
            .query(&probe(
                "SELECT ?1, ?2, ?3, ?4",
                vec![
                    SqlValue::Integer(7),
                    SqlValue::Real(2.5),
                    SqlValue::Text("abc".to_string()),
                    SqlValue::date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
                ],
            ))
            .await?;

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.integer("n")?, 7);
        assert_eq!(row.real("x")?, 2.5);
        assert_eq!(row.text("t")?, "abc");
        assert_eq!(row.date("d")?, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        Ok(())
    }

    #[tokio::test]
    async fn test_real_column_accepts_integer_storage() -> Result<()> {
        let port = SeaOrmPort::new(setup_test_db().await?);
        let rows = port
            .query(&probe("SELECT 1, 3, 'x', '2024-01-01 10:30:00'", vec![]))
            .await?;

        assert_eq!(rows[0].real("x")?, 3.0);
        assert_eq!(rows[0].money("x")?.to_string(), "3.00");
        assert_eq!(
            rows[0].date("d")?,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_nulls_are_preserved() -> Result<()> {
        let port = SeaOrmPort::new(setup_test_db().await?);
        let rows = port
            .query(&probe("SELECT NULL, NULL, NULL, NULL", vec![]))
            .await?;

        let row = &rows[0];
        assert_eq!(row.opt_integer("n")?, None);
        assert_eq!(row.real("x")?, 0.0);
        assert_eq!(row.opt_text("t")?, None);
        assert_eq!(row.opt_date("d")?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_text_is_never_read_as_number() -> Result<()> {
        let port = SeaOrmPort::new(setup_test_db().await?);
        let result = port
            .query(&probe("SELECT 'seven', 1.0, 'x', NULL", vec![]))
            .await;

        assert!(matches!(result, Err(Error::Decode { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() -> Result<()> {
        let port = SeaOrmPort::new(setup_test_db().await?);
        let rows = port
            .query(&probe(
                "SELECT id, total_price, order_number, order_date FROM orders",
                vec![],
            ))
            .await?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_syntax_error_is_storage_error() -> Result<()> {
        let port = SeaOrmPort::new(setup_test_db().await?);
        let result = port.query(&probe("SELEKT nothing", vec![])).await;
        assert!(matches!(result, Err(Error::Storage { .. })));
        Ok(())
    }

    #[test]
    fn test_row_arity_checked() {
        let result = Row::new("probe", PROBE, vec![SqlValue::Null]);
        assert!(matches!(result, Err(Error::Decode { .. })));
    }
}
