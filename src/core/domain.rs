//! Canonical vocabularies for order status, order type and movement type.
//!
//! The store contains both English keys and legacy Czech labels. Each enum
//! owns an alias table; the query registry turns it into a SQL `CASE`
//! expression so every aggregate sees canonical keys only.

use serde::Serialize;

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, not started
    New,
    /// Work in progress
    InProgress,
    /// Finished and invoiced
    Completed,
    /// Called off; excluded from revenue unless requested
    Cancelled,
}

impl OrderStatus {
    /// All statuses in display order
    pub const ALL: [Self; 4] = [Self::New, Self::InProgress, Self::Completed, Self::Cancelled];

    const ALIASES: &'static [(&'static str, Self)] = &[
        ("new", Self::New),
        ("scheduled", Self::New),
        ("Nová", Self::New),
        ("Nový", Self::New),
        ("in_progress", Self::InProgress),
        ("V práci", Self::InProgress),
        ("Probíhá", Self::InProgress),
        ("completed", Self::Completed),
        ("Dokončeno", Self::Completed),
        ("Hotovo", Self::Completed),
        ("cancelled", Self::Cancelled),
        ("Zrušeno", Self::Cancelled),
    ];

    /// Canonical machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Maps a stored value (canonical or legacy) to its canonical status.
    #[must_use]
    pub fn from_storage(raw: &str) -> Option<Self> {
        lookup(Self::ALIASES, raw)
    }

    /// SQL expression normalizing `column` to canonical keys. Unknown values
    /// pass through unchanged.
    #[must_use]
    pub fn sql_canonical(column: &str) -> String {
        canonical_case(column, Self::ALIASES, None, Self::as_str)
    }
}

/// Kind of work an order represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Scheduled maintenance
    Service,
    /// Fault repair
    Repair,
    /// Technical inspection
    Inspection,
    /// Counter sale of parts
    Sale,
    /// Anything else
    Other,
}

impl OrderType {
    /// All types in display order
    pub const ALL: [Self; 5] = [
        Self::Service,
        Self::Repair,
        Self::Inspection,
        Self::Sale,
        Self::Other,
    ];

    const ALIASES: &'static [(&'static str, Self)] = &[
        ("service", Self::Service),
        ("Servis", Self::Service),
        ("repair", Self::Repair),
        ("Oprava", Self::Repair),
        ("inspection", Self::Inspection),
        ("STK", Self::Inspection),
        ("Prohlídka", Self::Inspection),
        ("sale", Self::Sale),
        ("Prodej", Self::Sale),
        ("other", Self::Other),
    ];

    /// Canonical machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Repair => "repair",
            Self::Inspection => "inspection",
            Self::Sale => "sale",
            Self::Other => "other",
        }
    }

    /// Maps a stored value to its canonical type; unknown values are `Other`.
    #[must_use]
    pub fn from_storage(raw: &str) -> Self {
        lookup(Self::ALIASES, raw).unwrap_or(Self::Other)
    }

    /// SQL expression normalizing `column` to canonical keys, unknown → `other`.
    #[must_use]
    pub fn sql_canonical(column: &str) -> String {
        canonical_case(column, Self::ALIASES, Some(Self::Other.as_str()), Self::as_str)
    }
}

/// Direction of a warehouse movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received
    Receipt,
    /// Goods issued to an order or sold
    Issue,
    /// Stock-take correction, may be negative
    Adjustment,
}

impl MovementType {
    /// All movement types in display order
    pub const ALL: [Self; 3] = [Self::Receipt, Self::Issue, Self::Adjustment];

    const ALIASES: &'static [(&'static str, Self)] = &[
        ("receipt", Self::Receipt),
        ("příjem", Self::Receipt),
        ("issue", Self::Issue),
        ("výdej", Self::Issue),
        ("adjustment", Self::Adjustment),
        ("korekce", Self::Adjustment),
    ];

    /// Canonical machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Issue => "issue",
            Self::Adjustment => "adjustment",
        }
    }

    /// Maps a stored value to its canonical movement type.
    #[must_use]
    pub fn from_storage(raw: &str) -> Option<Self> {
        lookup(Self::ALIASES, raw)
    }

    /// SQL expression normalizing `column` to canonical keys.
    #[must_use]
    pub fn sql_canonical(column: &str) -> String {
        canonical_case(column, Self::ALIASES, None, Self::as_str)
    }
}

fn lookup<T: Copy>(aliases: &[(&str, T)], raw: &str) -> Option<T> {
    let raw = raw.trim();
    aliases
        .iter()
        .find(|(alias, _)| *alias == raw)
        .or_else(|| {
            aliases
                .iter()
                .find(|(alias, _)| alias.to_lowercase() == raw.to_lowercase())
        })
        .map(|(_, value)| *value)
}

fn canonical_case<T: Copy>(
    column: &str,
    aliases: &[(&str, T)],
    fallback: Option<&str>,
    key: fn(T) -> &'static str,
) -> String {
    // SQLite LOWER folds ASCII only; the legacy labels differ from their
    // lowercase form in ASCII letters alone.
    let mut sql = format!("(CASE LOWER(TRIM({column}))");
    for (alias, value) in aliases {
        sql.push_str(&format!(
            " WHEN '{}' THEN '{}'",
            alias.to_lowercase().replace('\'', "''"),
            key(*value)
        ));
    }
    match fallback {
        Some(other) => sql.push_str(&format!(" ELSE '{other}' END)")),
        None => sql.push_str(&format!(" ELSE {column} END)")),
    }
    sql
}
