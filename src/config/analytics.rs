//! Analytics tunables loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all, via
//! [`AnalyticsConfig::default`]) is a valid configuration.
//!
//! ```toml
//! [analytics]
//! dead_stock_threshold_days = 120
//! forecast_periods = 3
//! ```

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Analytics section
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Tunables used by the composer when a view does not override them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Items idle longer than this are dead stock
    pub dead_stock_threshold_days: i64,
    /// Consumption window for purchase prediction
    pub purchase_lookback_days: u32,
    /// How far ahead purchase prediction looks
    pub purchase_horizon_days: u32,
    /// Window of the moving average overlay
    pub moving_average_window: usize,
    /// Number of future buckets a forecast produces
    pub forecast_periods: usize,
    /// Months of history fed to the monthly forecasts
    pub forecast_history_months: u32,
    /// Row limit for "top" tables
    pub top_limit: i64,
    /// Paid hours per mechanic per working day
    pub workday_hours: f64,
    /// Open orders older than this are overdue
    pub overdue_order_days: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            dead_stock_threshold_days: 180,
            purchase_lookback_days: 90,
            purchase_horizon_days: 30,
            moving_average_window: 3,
            forecast_periods: 6,
            forecast_history_months: 12,
            top_limit: 10,
            workday_hours: 8.0,
            overdue_order_days: 14,
        }
    }
}

/// Parses analytics configuration from TOML text.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML syntax is invalid or a field has the
/// wrong type.
pub fn parse_config(contents: &str) -> Result<AnalyticsConfig> {
    toml::from_str::<Config>(contents)
        .map(|config| config.analytics)
        .map_err(|e| Error::Config {
            message: format!("Failed to parse analytics configuration: {e}"),
        })
}

/// Loads analytics configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AnalyticsConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading analytics configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let toml_str = r"
            [analytics]
            dead_stock_threshold_days = 120
            forecast_periods = 3
        ";

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.dead_stock_threshold_days, 120);
        assert_eq!(config.forecast_periods, 3);
        assert_eq!(config.purchase_lookback_days, 90);
        assert_eq!(config.workday_hours, 8.0);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_parse_wrong_type_is_config_error() {
        let result = parse_config("[analytics]\ntop_limit = \"ten\"");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/analytics.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
