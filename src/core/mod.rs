/// Typed aggregates over the port: orders, hours, stock and movements
pub mod aggregation;

/// View composition into snapshots
pub mod composer;

/// Canonical order, status and movement vocabularies
pub mod domain;

/// Revenue, cost and profit breakdowns
pub mod finance;

/// Linear-regression forecasting
pub mod forecast;

/// ABC, turnover, margin, dead stock and purchase planning
pub mod inventory;

/// KPI evaluation against targets
pub mod kpi;

/// Money rounding and safe division
pub mod numeric;

/// Periods, buckets and quick presets
pub mod period;

/// Read-only data access port and its SeaORM adapter
pub mod port;

/// Named SQL queries with row descriptors
pub mod queries;

/// Report documents built from snapshots
pub mod report;

/// View snapshot data model
pub mod snapshot;

/// Persisted KPI targets and preferences
pub mod targets;

/// Moving averages, seasonality and period comparisons
pub mod trends;
