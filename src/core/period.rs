//! Calendar arithmetic for analytics periods.
//!
//! A [`Period`] is an inclusive date range plus the bucket granularity its
//! series are grouped by. Bucket keys are stable machine strings
//! (`YYYY-MM-DD`, `YYYY-WW`, `YYYY-MM`, `YYYY-Qn`, `YYYY`); labels are
//! language-neutral, localized month names belong to the renderer.

use crate::errors::{Error, Result};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of one bucket in a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One calendar day
    Day,
    /// ISO week, Monday to Sunday
    Week,
    /// Calendar month
    Month,
    /// Calendar quarter starting in January, April, July or October
    Quarter,
    /// Calendar year
    Year,
}

/// Inclusive date range with a bucket granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    from: NaiveDate,
    to: NaiveDate,
    granularity: Granularity,
}

/// One bucket of a period, clipped to the period bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Stable machine key (`YYYY-MM` etc.)
    pub key: String,
    /// Display label
    pub label: String,
    /// First day of the bucket inside the period
    pub start: NaiveDate,
    /// Last day of the bucket inside the period
    pub end: NaiveDate,
}

impl Period {
    /// Creates a period, rejecting `from > to`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPeriod`] when the start lies after the end.
    pub fn new(from: NaiveDate, to: NaiveDate, granularity: Granularity) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidPeriod { from, to });
        }
        Ok(Self {
            from,
            to,
            granularity,
        })
    }

    /// First day, inclusive
    #[must_use]
    pub const fn from(&self) -> NaiveDate {
        self.from
    }

    /// Last day, inclusive
    #[must_use]
    pub const fn to(&self) -> NaiveDate {
        self.to
    }

    /// Bucket granularity
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Same range, different granularity
    #[must_use]
    pub const fn with_granularity(self, granularity: Granularity) -> Self {
        Self {
            granularity,
            ..self
        }
    }

    /// Number of days, both ends included
    #[must_use]
    pub fn len_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Length in 30-day months, used by rate computations
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn months(&self) -> f64 {
        self.len_days() as f64 / 30.0
    }

    /// Whether `date` lies inside the period
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Every bucket touching the period, in order. Never empty.
    #[must_use]
    pub fn buckets(&self) -> Vec<Bucket> {
        let mut buckets = Vec::new();
        let mut cursor = self.from;
        loop {
            let end = bucket_end(cursor, self.granularity).min(self.to);
            let key = bucket_key(cursor, self.granularity);
            buckets.push(Bucket {
                label: bucket_label(&key, self.granularity),
                key,
                start: cursor,
                end,
            });
            match end.succ_opt() {
                Some(next) if next <= self.to => cursor = next,
                _ => break,
            }
        }
        buckets
    }

    /// `from .. to` in ISO form
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} .. {}", self.from.format("%Y-%m-%d"), self.to.format("%Y-%m-%d"))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Named period presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickPeriod {
    /// Today only
    Today,
    /// Monday of this week until today
    ThisWeek,
    /// First of this month until today
    ThisMonth,
    /// First day of this quarter until today
    ThisQuarter,
    /// January 1st until today
    ThisYear,
    /// The whole previous calendar month
    LastMonth,
    /// The whole previous calendar quarter
    LastQuarter,
    /// The whole previous calendar year
    LastYear,
    /// Three months back from today
    Last3Months,
    /// Six months back from today
    Last6Months,
    /// Twelve months back from today
    Last12Months,
}

impl QuickPeriod {
    /// Machine name of the preset
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::ThisWeek => "this_week",
            Self::ThisMonth => "this_month",
            Self::ThisQuarter => "this_quarter",
            Self::ThisYear => "this_year",
            Self::LastMonth => "last_month",
            Self::LastQuarter => "last_quarter",
            Self::LastYear => "last_year",
            Self::Last3Months => "last_3_months",
            Self::Last6Months => "last_6_months",
            Self::Last12Months => "last_12_months",
        }
    }

    /// Granularity a chart of this preset reads best in
    #[must_use]
    pub const fn default_granularity(self) -> Granularity {
        match self {
            Self::Today | Self::ThisWeek | Self::ThisMonth | Self::LastMonth => Granularity::Day,
            Self::ThisQuarter | Self::LastQuarter | Self::Last3Months => Granularity::Week,
            Self::ThisYear | Self::LastYear | Self::Last6Months | Self::Last12Months => {
                Granularity::Month
            }
        }
    }
}

impl FromStr for QuickPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "today" => Self::Today,
            "this_week" => Self::ThisWeek,
            "this_month" => Self::ThisMonth,
            "this_quarter" => Self::ThisQuarter,
            "this_year" => Self::ThisYear,
            "last_month" => Self::LastMonth,
            "last_quarter" => Self::LastQuarter,
            "last_year" => Self::LastYear,
            "last_3_months" => Self::Last3Months,
            "last_6_months" => Self::Last6Months,
            "last_12_months" => Self::Last12Months,
            other => {
                return Err(Error::UnknownPreset {
                    name: other.to_string(),
                });
            }
        })
    }
}

/// Resolves a preset relative to `today`.
#[must_use]
pub fn quick_period(preset: QuickPeriod, today: NaiveDate) -> Period {
    let (from, to) = match preset {
        QuickPeriod::Today => (today, today),
        QuickPeriod::ThisWeek => (week_start(today), today),
        QuickPeriod::ThisMonth => (month_start(today.year(), today.month()), today),
        QuickPeriod::ThisQuarter => (quarter_start(today), today),
        QuickPeriod::ThisYear => (month_start(today.year(), 1), today),
        QuickPeriod::LastMonth => {
            let end = shift_days(month_start(today.year(), today.month()), -1);
            (month_start(end.year(), end.month()), end)
        }
        QuickPeriod::LastQuarter => {
            let end = shift_days(quarter_start(today), -1);
            (quarter_start(end), end)
        }
        QuickPeriod::LastYear => {
            let year = today.year() - 1;
            (month_start(year, 1), year_end(year))
        }
        QuickPeriod::Last3Months => (months_back(today, 3), today),
        QuickPeriod::Last6Months => (months_back(today, 6), today),
        QuickPeriod::Last12Months => (months_back(today, 12), today),
    };

    Period {
        from,
        to,
        granularity: preset.default_granularity(),
    }
}

/// Period of equal length ending the day before `period` starts.
#[must_use]
pub fn previous_period(period: &Period) -> Period {
    let to = shift_days(period.from, -1);
    Period {
        from: shift_days(to, -(period.len_days() - 1)),
        to,
        granularity: period.granularity,
    }
}

/// Period of equal length starting the day after `period` ends.
#[must_use]
pub fn next_period(period: &Period) -> Period {
    let from = shift_days(period.to, 1);
    Period {
        from,
        to: shift_days(from, period.len_days() - 1),
        granularity: period.granularity,
    }
}

/// The `count` whole buckets that follow the period, in order.
#[must_use]
pub fn following_buckets(period: &Period, count: usize) -> Vec<Bucket> {
    let mut buckets = Vec::with_capacity(count);
    let mut cursor = shift_days(period.to, 1);
    if bucket_start(cursor, period.granularity) != cursor {
        cursor = shift_days(bucket_end(cursor, period.granularity), 1);
    }
    for _ in 0..count {
        let start = bucket_start(cursor, period.granularity);
        let end = bucket_end(cursor, period.granularity);
        let key = bucket_key(start, period.granularity);
        buckets.push(Bucket {
            label: bucket_label(&key, period.granularity),
            key,
            start,
            end,
        });
        cursor = shift_days(end, 1);
    }
    buckets
}

/// Monday to Friday count inside the period. Public holidays are not excluded.
#[must_use]
pub fn working_days(period: &Period) -> u32 {
    let count = period
        .from
        .iter_days()
        .take_while(|day| *day <= period.to)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Stable key of the bucket containing `date`.
#[must_use]
pub fn bucket_key(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let week = date.iso_week();
            format!("{}-{:02}", week.year(), week.week())
        }
        Granularity::Month => date.format("%Y-%m").to_string(),
        Granularity::Quarter => format!("{}-Q{}", date.year(), quarter_of(date.month())),
        Granularity::Year => date.year().to_string(),
    }
}

/// Display label for a bucket key; unparsable keys are returned unchanged.
#[must_use]
pub fn bucket_label(key: &str, granularity: Granularity) -> String {
    let label = match granularity {
        Granularity::Day => NaiveDate::parse_from_str(key, "%Y-%m-%d")
            .ok()
            .map(|date| date.format("%d.%m.%Y").to_string()),
        Granularity::Week => key
            .split_once('-')
            .map(|(year, week)| format!("W{week}/{year}")),
        Granularity::Month => key
            .split_once('-')
            .map(|(year, month)| format!("{month}/{year}")),
        Granularity::Quarter => key
            .split_once("-Q")
            .map(|(year, quarter)| format!("Q{quarter}/{year}")),
        Granularity::Year => None,
    };
    label.unwrap_or_else(|| key.to_string())
}

/// First day of the bucket containing `date`.
#[must_use]
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => week_start(date),
        Granularity::Month => month_start(date.year(), date.month()),
        Granularity::Quarter => quarter_start(date),
        Granularity::Year => month_start(date.year(), 1),
    }
}

/// Last day of the bucket containing `date`.
#[must_use]
pub fn bucket_end(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => shift_days(
            date,
            6 - i64::from(date.weekday().num_days_from_monday()),
        ),
        Granularity::Month => month_end(date.year(), date.month()),
        Granularity::Quarter => {
            let start = quarter_start(date);
            month_end(start.year(), start.month() + 2)
        }
        Granularity::Year => year_end(date.year()),
    }
}

/// Quarter number 1..=4 of a month 1..=12
#[must_use]
pub const fn quarter_of(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}

/// Adds (or with a negative count, subtracts) whole days, saturating at the
/// calendar limits.
#[must_use]
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(magnitude).unwrap_or(NaiveDate::MIN)
    }
}

/// First day of a calendar month
#[must_use]
pub fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Last day of a calendar month
#[must_use]
pub fn month_end(year: i32, month: u32) -> NaiveDate {
    let next = if month >= 12 {
        month_start(year + 1, 1)
    } else {
        month_start(year, month + 1)
    };
    shift_days(next, -1)
}

fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    shift_days(date, -i64::from(date.weekday().num_days_from_monday()))
}

fn quarter_start(date: NaiveDate) -> NaiveDate {
    month_start(date.year(), (quarter_of(date.month()) - 1) * 3 + 1)
}

fn months_back(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months))
        .map_or(NaiveDate::MIN, |date| shift_days(date, 1))
}
