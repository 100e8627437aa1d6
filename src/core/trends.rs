//! Time-series indicators: moving averages, growth curves, seasonal indices,
//! weekday patterns and period-over-period comparisons.

use crate::core::numeric::{finite, percent_change, ratio, round_to};
use crate::core::period::quarter_of;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Trailing moving average over a uniformly spaced series.
///
/// The first `window - 1` values are passed through unchanged; the output has
/// the input's length. A window of 0 or 1 returns the input.
#[must_use]
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            if i + 1 < window {
                *value
            } else {
                let slice = &values[i + 1 - window..=i];
                #[allow(clippy::cast_precision_loss)]
                let mean = slice.iter().sum::<f64>() / window as f64;
                round_to(mean, 2)
            }
        })
        .collect()
}

/// One point of a growth curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthPoint {
    /// Bucket key
    pub key: String,
    /// Value of the bucket
    pub value: f64,
    /// Change against the previous bucket in percent; `None` for the first
    /// bucket and after a zero
    pub growth_pct: Option<f64>,
    /// Running total
    pub cumulative: f64,
}

/// Period-over-period growth and running total of a keyed series.
#[must_use]
pub fn growth_curve(points: &[(String, f64)]) -> Vec<GrowthPoint> {
    let mut cumulative = 0.0;
    let mut previous: Option<f64> = None;
    points
        .iter()
        .map(|(key, value)| {
            cumulative += value;
            let growth_pct = previous
                .and_then(|prev| percent_change(*value, prev))
                .map(|pct| round_to(pct, 1));
            previous = Some(*value);
            GrowthPoint {
                key: key.clone(),
                value: *value,
                growth_pct,
                cumulative: round_to(cumulative, 2),
            }
        })
        .collect()
}

/// Season class of a calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Index above 1.15
    High,
    /// Index within 0.85..=1.15
    Normal,
    /// Index below 0.85
    Low,
}

impl Season {
    /// Class of a seasonal index.
    #[must_use]
    pub fn from_index(index: f64) -> Self {
        if index > 1.15 {
            Self::High
        } else if index >= 0.85 {
            Self::Normal
        } else {
            Self::Low
        }
    }

    /// Machine key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

/// Seasonal index of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalIndex {
    /// Month 1..=12
    pub month: u32,
    /// Mean revenue of the month over the observed years
    pub mean: Option<f64>,
    /// `mean / overall_mean`; `None` without observations
    pub index: Option<f64>,
    /// Season class; `None` without observations
    pub season: Option<Season>,
}

/// Monthly total used as a seasonality observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthTotal {
    /// First day of the month
    pub month_start: NaiveDate,
    /// Total of the month
    pub value: f64,
}

/// Seasonal indices from monthly totals spanning one or more years.
///
/// The mean of every calendar month is taken over its observations; the
/// overall mean is the mean of the monthly means.
#[must_use]
pub fn seasonal_indices(observations: &[MonthTotal]) -> Vec<SeasonalIndex> {
    let mut sums = [(0.0f64, 0u32); 12];
    for observation in observations {
        let slot = &mut sums[observation.month_start.month0() as usize];
        slot.0 += observation.value;
        slot.1 += 1;
    }
    let means = sums.map(|(sum, count)| (count > 0).then(|| sum / f64::from(count)));
    seasonal_indices_from_means(&means)
}

/// Seasonal indices from per-month means, January first.
#[must_use]
pub fn seasonal_indices_from_means(means: &[Option<f64>; 12]) -> Vec<SeasonalIndex> {
    let observed: Vec<f64> = means.iter().flatten().copied().collect();
    #[allow(clippy::cast_precision_loss)]
    let overall_mean = ratio(observed.iter().sum(), observed.len() as f64);

    (1..=12u32)
        .zip(means.iter())
        .map(|(month, mean)| {
            let index = mean
                .filter(|_| overall_mean > 0.0)
                .map(|mean| round_to(mean / overall_mean, 3));
            SeasonalIndex {
                month,
                mean: mean.map(|m| round_to(m, 2)),
                index,
                season: index.map(Season::from_index),
            }
        })
        .collect()
}

/// Order load of one weekday
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayLoad {
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u32,
    /// Orders placed on this weekday
    pub orders: u64,
    /// Share of all orders in percent
    pub share_pct: f64,
}

/// Order counts per day of week, Sunday first.
#[must_use]
pub fn weekday_pattern(daily: &[(NaiveDate, u64)]) -> Vec<WeekdayLoad> {
    let mut counts = [0u64; 7];
    for (day, orders) in daily {
        counts[day.weekday().num_days_from_sunday() as usize] += orders;
    }
    #[allow(clippy::cast_precision_loss)]
    let total = counts.iter().sum::<u64>() as f64;

    (0..7u32)
        .zip(counts)
        .map(|(weekday, orders)| {
            #[allow(clippy::cast_precision_loss)]
            let share = ratio(orders as f64, total) * 100.0;
            WeekdayLoad {
                weekday,
                orders,
                share_pct: round_to(share, 1),
            }
        })
        .collect()
}

/// One bucket compared with its counterpart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Bucket key of the current value (`MM` for months, `YYYY-Qn` for quarters)
    pub key: String,
    /// Current value
    pub current: f64,
    /// Value it is compared with
    pub previous: f64,
    /// `current - previous`
    pub delta: f64,
    /// `delta / previous × 100`; `None` unless `previous > 0`
    pub pct_delta: Option<f64>,
}

impl Comparison {
    /// Compares two values under `key`.
    #[must_use]
    pub fn new(key: impl Into<String>, current: f64, previous: f64) -> Self {
        Self {
            key: key.into(),
            current: round_to(current, 2),
            previous: round_to(previous, 2),
            delta: round_to(current - previous, 2),
            pct_delta: percent_change(current, previous).map(|pct| round_to(pct, 1)),
        }
    }
}

/// Month-by-month comparison of `current_year` with the year before.
/// Months without observations count as zero.
#[must_use]
pub fn year_over_year(observations: &[MonthTotal], current_year: i32) -> Vec<Comparison> {
    let mut current = [0.0f64; 12];
    let mut previous = [0.0f64; 12];
    for observation in observations {
        let month = observation.month_start.month0() as usize;
        match observation.month_start.year() {
            year if year == current_year => current[month] += observation.value,
            year if year == current_year - 1 => previous[month] += observation.value,
            _ => {}
        }
    }

    (1..=12u32)
        .map(|month| {
            let index = (month - 1) as usize;
            Comparison::new(format!("{month:02}"), current[index], previous[index])
        })
        .collect()
}

/// Compares every quarter with the one before it. `quarters` must be in
/// chronological order; the first only serves as the baseline of the second.
#[must_use]
pub fn quarter_over_quarter(quarters: &[MonthTotal]) -> Vec<Comparison> {
    quarters
        .windows(2)
        .map(|pair| {
            let start = pair[1].month_start;
            Comparison::new(
                format!("{}-Q{}", start.year(), quarter_of(start.month())),
                pair[1].value,
                pair[0].value,
            )
        })
        .collect()
}

/// Next value assuming the last change repeats, never negative.
#[must_use]
pub fn naive_projection(current: f64, previous: f64) -> f64 {
    finite((current + (current - previous)).max(0.0))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::date;

    fn month(year: i32, month: u32, value: f64) -> MonthTotal {
        MonthTotal {
            month_start: date(year, month, 1),
            value,
        }
    }

    #[test]
    fn test_moving_average_passes_first_values_through() {
        let averaged = moving_average(&[3.0, 6.0, 9.0, 12.0], 3);
        assert_eq!(averaged, [3.0, 6.0, 6.0, 9.0]);
        assert_eq!(moving_average(&[1.0, 2.0], 1), [1.0, 2.0]);
        assert_eq!(moving_average(&[1.0, 2.0], 5), [1.0, 2.0]);
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn test_growth_curve() {
        let points = [
            ("2024-01".to_string(), 0.0),
            ("2024-02".to_string(), 100.0),
            ("2024-03".to_string(), 150.0),
        ];
        let curve = growth_curve(&points);
        assert_eq!(curve[0].growth_pct, None);
        // Growth from zero is undefined
        assert_eq!(curve[1].growth_pct, None);
        assert_eq!(curve[2].growth_pct, Some(50.0));
        assert_eq!(curve[2].cumulative, 250.0);
    }

    #[test]
    fn test_seasonality_classes() {
        let means = [80.0, 80.0, 120.0, 100.0, 100.0, 90.0, 90.0, 90.0, 120.0, 110.0, 100.0, 120.0]
            .map(Some);
        let indices = seasonal_indices_from_means(&means);

        let seasons: Vec<Season> = indices.iter().filter_map(|i| i.season).collect();
        assert_eq!(seasons.len(), 12);
        for month in [1, 2] {
            assert_eq!(indices[month - 1].season, Some(Season::Low));
        }
        for month in [3, 9, 12] {
            assert_eq!(indices[month - 1].season, Some(Season::High));
        }
        for month in [4, 5, 6, 7, 8, 10, 11] {
            assert_eq!(indices[month - 1].season, Some(Season::Normal));
        }
        assert_eq!(indices[2].index, Some(1.2));
    }

    #[test]
    fn test_seasonality_from_observations_averages_years() {
        let observations = [month(2022, 3, 100.0), month(2023, 3, 300.0), month(2023, 4, 200.0)];
        let indices = seasonal_indices(&observations);
        assert_eq!(indices[2].mean, Some(200.0));
        assert_eq!(indices[2].index, Some(1.0));
        assert_eq!(indices[0].index, None);
        assert_eq!(indices[0].season, None);
    }

    #[test]
    fn test_weekday_pattern_starts_on_sunday() {
        // 2024-03-03 is a Sunday, 2024-03-04 a Monday
        let pattern = weekday_pattern(&[(date(2024, 3, 3), 1), (date(2024, 3, 4), 3)]);
        assert_eq!(pattern[0].orders, 1);
        assert_eq!(pattern[1].orders, 3);
        assert_eq!(pattern[1].share_pct, 75.0);
    }

    #[test]
    fn test_year_over_year() {
        let observations = [month(2023, 3, 150.0), month(2022, 3, 100.0), month(2022, 4, 0.0)];
        let comparison = year_over_year(&observations, 2023);
        assert_eq!(comparison.len(), 12);
        assert_eq!(comparison[2].key, "03");
        assert_eq!(comparison[2].delta, 50.0);
        assert_eq!(comparison[2].pct_delta, Some(50.0));
        assert_eq!(comparison[3].pct_delta, None);
    }

    #[test]
    fn test_quarter_over_quarter() {
        let quarters = [
            month(2023, 1, 100.0),
            month(2023, 4, 200.0),
            month(2023, 7, 100.0),
        ];
        let comparison = quarter_over_quarter(&quarters);
        assert_eq!(comparison.len(), 2);
        assert_eq!(comparison[0].key, "2023-Q2");
        assert_eq!(comparison[0].pct_delta, Some(100.0));
        assert_eq!(comparison[1].pct_delta, Some(-50.0));
    }

    #[test]
    fn test_naive_projection_never_negative() {
        assert_eq!(naive_projection(100.0, 80.0), 120.0);
        assert_eq!(naive_projection(10.0, 50.0), 0.0);
    }
}
