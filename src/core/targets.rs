//! Target Store - KPI thresholds and user preferences in the `settings` table.
//!
//! This is the only component that writes to the store. Rows are created with
//! their documented default on first read. Writes go through one async mutex
//! and a database transaction, so concurrent `set` calls never interleave.
//! Readers that need a consistent view take a [`KpiTargets`] snapshot.

use crate::{
    entities::{Setting, setting},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

const PREFERENCE_PREFIX: &str = "pref_";

/// Persisted numeric target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKey {
    /// Revenue per month
    MonthlyRevenue,
    /// Orders per month
    MonthlyOrders,
    /// Average order value
    AvgOrderValue,
    /// Mechanic utilization in percent
    MechanicUtilization,
    /// Gross margin in percent
    MarginTarget,
    /// Customer satisfaction in percent
    CustomerSatisfaction,
    /// Labor rate per hour used for labor cost
    HourlyRateDefault,
}

impl TargetKey {
    /// Every key, in storage order
    pub const ALL: [Self; 7] = [
        Self::MonthlyRevenue,
        Self::MonthlyOrders,
        Self::AvgOrderValue,
        Self::MechanicUtilization,
        Self::MarginTarget,
        Self::CustomerSatisfaction,
        Self::HourlyRateDefault,
    ];

    /// Key of the `settings` row
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::MonthlyRevenue => "kpi_monthly_revenue",
            Self::MonthlyOrders => "kpi_monthly_orders",
            Self::AvgOrderValue => "kpi_avg_order_value",
            Self::MechanicUtilization => "kpi_mechanic_utilization",
            Self::MarginTarget => "kpi_margin_target",
            Self::CustomerSatisfaction => "kpi_customer_satisfaction",
            Self::HourlyRateDefault => "hourly_rate_default",
        }
    }

    /// Value used when the row is missing or unparsable
    #[must_use]
    pub fn default_value(self) -> Decimal {
        Decimal::from(match self {
            Self::MonthlyRevenue => 500_000,
            Self::MonthlyOrders => 50,
            Self::AvgOrderValue => 10_000,
            Self::MechanicUtilization => 80,
            Self::MarginTarget => 30,
            Self::CustomerSatisfaction => 90,
            Self::HourlyRateDefault => 300,
        })
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for TargetKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.storage_key() == s || key.storage_key().strip_prefix("kpi_") == Some(s))
            .ok_or_else(|| Error::UnknownTarget { key: s.to_string() })
    }
}

/// Immutable copy of every target, taken once per view computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiTargets {
    values: BTreeMap<TargetKey, Decimal>,
}

impl KpiTargets {
    /// Value of `key`, its default when absent
    #[must_use]
    pub fn get(&self, key: TargetKey) -> Decimal {
        self.values
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    /// Returns a copy with `key` replaced.
    #[must_use]
    pub fn with(mut self, key: TargetKey, value: Decimal) -> Self {
        self.values.insert(key, value);
        self
    }
}

impl Default for KpiTargets {
    fn default() -> Self {
        Self {
            values: TargetKey::ALL
                .into_iter()
                .map(|key| (key, key.default_value()))
                .collect(),
        }
    }
}

fn parse_target(key: TargetKey, raw: &str) -> Result<Decimal> {
    Decimal::from_str(&raw.trim().replace(',', ".")).map_err(|_| Error::Configuration {
        key: key.storage_key().to_string(),
        value: raw.to_string(),
    })
}

/// Read/write access to targets and preferences
#[derive(Debug)]
pub struct TargetStore {
    db: DatabaseConnection,
    write_lock: Mutex<()>,
}

impl TargetStore {
    /// Creates a store over `db`.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    async fn find(&self, key: &str) -> Result<Option<setting::Model>> {
        Ok(Setting::find()
            .filter(setting::Column::Key.eq(key))
            .one(&self.db)
            .await?)
    }

    /// Current value of `key`. Creates the row with its default on first
    /// read; an unparsable stored value is logged and the default returned.
    pub async fn get(&self, key: TargetKey) -> Result<Decimal> {
        match self.try_get(key).await {
            Err(Error::Configuration { key: name, value }) => {
                warn!(key = %name, value = %value, "unparsable target, using default");
                Ok(key.default_value())
            }
            other => other,
        }
    }

    /// Like [`TargetStore::get`] but surfaces unparsable values.
    ///
    /// # Errors
    /// [`Error::Configuration`] when the stored text is not a decimal,
    /// [`Error::Storage`] when the store fails.
    pub async fn try_get(&self, key: TargetKey) -> Result<Decimal> {
        if let Some(row) = self.find(key.storage_key()).await? {
            return parse_target(key, &row.value);
        }

        let _guard = self.write_lock.lock().await;
        // Another writer may have created it while we waited
        if let Some(row) = self.find(key.storage_key()).await? {
            return parse_target(key, &row.value);
        }
        let default = key.default_value();
        let txn = self.db.begin().await?;
        upsert(&txn, key.storage_key(), &default.to_string()).await?;
        txn.commit().await?;
        info!(key = %key, value = %default, "created target with default");
        Ok(default)
    }

    /// Persists a new target value.
    #[instrument(skip(self))]
    pub async fn set(&self, key: TargetKey, value: Decimal) -> Result<()> {
        self.write(key.storage_key(), &value.normalize().to_string()).await?;
        info!(value = %value, "target updated");
        Ok(())
    }

    /// Every target, read once.
    pub async fn snapshot(&self) -> Result<KpiTargets> {
        let mut values = BTreeMap::new();
        for key in TargetKey::ALL {
            values.insert(key, self.get(key).await?);
        }
        Ok(KpiTargets { values })
    }

    /// A stored user preference.
    pub async fn preference(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .find(&format!("{PREFERENCE_PREFIX}{name}"))
            .await?
            .map(|row| row.value))
    }

    /// Stores a user preference.
    #[instrument(skip(self, value))]
    pub async fn set_preference(&self, name: &str, value: &str) -> Result<()> {
        self.write(&format!("{PREFERENCE_PREFIX}{name}"), value).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let txn = self.db.begin().await?;
        upsert(&txn, key, value).await?;
        txn.commit().await?;
        Ok(())
    }
}

async fn upsert<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(row) = existing {
        let mut active_model: setting::ActiveModel = row.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
