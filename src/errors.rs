//! Unified error type for the analytics core.
//!
//! Every fallible operation returns [`Result`]. Storage failures keep their
//! message so the composer can attach it to the section that issued the query.

use chrono::NaiveDate;
use thiserror::Error;

/// All errors produced by the analytics core.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store failed (I/O, SQL syntax, connection).
    #[error("Storage error: {message}")]
    Storage {
        /// Diagnostic from the store
        message: String,
    },

    /// A storage row did not match the row descriptor declared for its query.
    #[error("Query `{query}` returned an unexpected value in column `{column}` (expected {expected})")]
    Decode {
        /// Registry name of the query
        query: String,
        /// Column name from the row descriptor
        column: String,
        /// Declared column kind
        expected: String,
    },

    /// A persisted KPI target could not be parsed as a decimal.
    #[error("Setting `{key}` has unparsable value `{value}`")]
    Configuration {
        /// Settings key
        key: String,
        /// Raw stored text
        value: String,
    },

    /// Too few observations for a forecast.
    #[error("Insufficient data: needed {needed} observations, got {got}")]
    InsufficientData {
        /// Minimum number of observations
        needed: usize,
        /// Observations available
        got: usize,
    },

    /// A period whose start lies after its end.
    #[error("Invalid period: {from} is after {to}")]
    InvalidPeriod {
        /// Requested start
        from: NaiveDate,
        /// Requested end
        to: NaiveDate,
    },

    /// View name not known to the composer.
    #[error("Unknown view: {name}")]
    UnknownView {
        /// The name as requested
        name: String,
    },

    /// Quick period preset not known to the period model.
    #[error("Unknown period preset: {name}")]
    UnknownPreset {
        /// The name as requested
        name: String,
    },

    /// Target key not known to the target store.
    #[error("Unknown target key: {key}")]
    UnknownTarget {
        /// The key as requested
        key: String,
    },

    /// Loading the analytics configuration file failed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Encoding a document as JSON failed.
    #[error("Serialization error: {source}")]
    Serialize {
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        Self::Storage {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_serialize_error_keeps_its_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = Error::Serialize { source };

        assert!(error.to_string().starts_with("Serialization error: "));
        assert!(std::error::Error::source(&error).is_some());
    }
}
