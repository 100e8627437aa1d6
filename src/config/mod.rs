/// Database connection and schema bootstrap
pub mod database;

/// Analytics tunables loaded from TOML
pub mod analytics;

pub use analytics::{AnalyticsConfig, load_config, parse_config};
