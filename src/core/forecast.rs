//! Linear-regression forecaster.
//!
//! Ordinary least squares over a uniformly spaced history. Bands are a fixed
//! ±15 % heuristic around each prediction, not a statistical interval. With
//! fewer than three observations the forecast degrades to the last observed
//! value with a confidence of zero.

use crate::core::numeric::{finite, ratio, round_to};
use crate::core::trends::SeasonalIndex;
use crate::errors::{Error, Result};
use serde::Serialize;

/// Minimum history length for a regression
pub const MIN_OBSERVATIONS: usize = 3;

const LOWER_BAND: f64 = 0.85;
const UPPER_BAND: f64 = 1.15;

/// Fitted line `y = slope·x + intercept`, x = 0..n-1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    /// Change per period
    pub slope: f64,
    /// Value at x = 0
    pub intercept: f64,
    /// Number of observations
    pub n: usize,
}

impl LinearFit {
    /// Non-negative prediction at index `x`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, x: usize) -> f64 {
        finite(self.slope.mul_add(x as f64, self.intercept).max(0.0))
    }
}

/// Least-squares fit of `values`.
///
/// # Errors
/// Returns [`Error::InsufficientData`] with fewer than three observations.
#[allow(clippy::cast_precision_loss)]
pub fn fit(values: &[f64]) -> Result<LinearFit> {
    let n = values.len();
    if n < MIN_OBSERVATIONS {
        return Err(Error::InsufficientData {
            needed: MIN_OBSERVATIONS,
            got: n,
        });
    }

    let count = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = count.mul_add(sum_xx, -(sum_x * sum_x));
    let slope = if denominator == 0.0 {
        0.0
    } else {
        finite(count.mul_add(sum_xy, -(sum_x * sum_y)) / denominator)
    };
    let intercept = finite(slope.mul_add(-sum_x, sum_y) / count);

    Ok(LinearFit {
        slope,
        intercept,
        n,
    })
}

/// `max(0, 100 - cv·100)` with the population standard deviation, clamped to
/// 0..=100. Zero for empty series or a non-positive mean.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn confidence_score(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean;
    round_to((100.0 - cv * 100.0).clamp(0.0, 100.0), 2)
}

/// One predicted period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    /// 1 for the first period after the history
    pub step: usize,
    /// Point prediction
    pub prediction: f64,
    /// `0.85 × prediction`
    pub lower: f64,
    /// `1.15 × prediction`
    pub upper: f64,
}

impl ForecastPoint {
    fn new(step: usize, prediction: f64) -> Self {
        Self {
            step,
            prediction: round_to(prediction, 2),
            lower: round_to(prediction * LOWER_BAND, 2),
            upper: round_to(prediction * UPPER_BAND, 2),
        }
    }
}

/// A complete forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// One point per requested period
    pub points: Vec<ForecastPoint>,
    /// First prediction
    pub next_period: f64,
    /// Sum of the first three predictions (scaled up when fewer were requested)
    pub next_quarter: f64,
    /// Sum of the first twelve predictions, else `sum × 12 / periods`
    pub next_year: f64,
    /// Heuristic confidence in 0..=100
    pub confidence: f64,
    /// The fitted line; `None` when degraded
    pub fit: Option<LinearFit>,
    /// Set when the history was too short for a regression
    pub degraded: bool,
}

/// Forecasts `periods` values after `history`.
///
/// Never fails: a history shorter than three observations yields the last
/// observed value (or zero) for every period, confidence 0 and `degraded`.
#[must_use]
pub fn forecast(history: &[f64], periods: usize) -> Forecast {
    let (predictions, fitted, confidence) = match fit(history) {
        Ok(line) => {
            let predictions: Vec<f64> = (0..periods).map(|i| line.predict(line.n + i)).collect();
            (predictions, Some(line), confidence_score(history))
        }
        Err(_) => {
            let last = history.last().copied().map_or(0.0, |v| finite(v.max(0.0)));
            (vec![last; periods], None, 0.0)
        }
    };

    Forecast {
        next_period: predictions.first().map_or(0.0, |v| round_to(*v, 2)),
        next_quarter: horizon_total(&predictions, 3),
        next_year: horizon_total(&predictions, 12),
        points: predictions
            .iter()
            .enumerate()
            .map(|(i, prediction)| ForecastPoint::new(i + 1, *prediction))
            .collect(),
        confidence,
        degraded: fitted.is_none(),
        fit: fitted,
    }
}

#[allow(clippy::cast_precision_loss)]
fn horizon_total(predictions: &[f64], horizon: usize) -> f64 {
    if predictions.len() >= horizon {
        return round_to(predictions[..horizon].iter().sum(), 2);
    }
    let sum: f64 = predictions.iter().sum();
    round_to(ratio(sum * horizon as f64, predictions.len() as f64), 2)
}

/// Scales each prediction by the seasonal index of its calendar month.
///
/// # Arguments
/// * `forecast` - The unadjusted forecast
/// * `first_month` - Calendar month (1..=12) of step 1
/// * `indices` - Seasonal indices; months without an index keep the raw value
#[must_use]
pub fn seasonally_adjusted(forecast: &Forecast, first_month: u32, indices: &[SeasonalIndex]) -> Vec<f64> {
    forecast
        .points
        .iter()
        .map(|point| {
            #[allow(clippy::cast_possible_truncation)]
            let month = (first_month.saturating_sub(1) + (point.step as u32 - 1)) % 12 + 1;
            let factor = indices
                .iter()
                .find(|index| index.month == month)
                .and_then(|index| index.index)
                .unwrap_or(1.0);
            round_to(point.prediction * factor, 2)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::trends::seasonal_indices_from_means;

    #[test]
    fn test_linear_forecast() {
        let result = forecast(&[100.0, 200.0, 300.0, 400.0, 500.0], 3);
        let line = result.fit.unwrap();
        assert!((line.slope - 100.0).abs() < 1e-9);
        assert!((line.intercept - 100.0).abs() < 1e-9);

        let predictions: Vec<f64> = result.points.iter().map(|p| p.prediction).collect();
        assert_eq!(predictions, [600.0, 700.0, 800.0]);
        let lower: Vec<f64> = result.points.iter().map(|p| p.lower).collect();
        assert_eq!(lower, [510.0, 595.0, 680.0]);
        let upper: Vec<f64> = result.points.iter().map(|p| p.upper).collect();
        assert_eq!(upper, [690.0, 805.0, 920.0]);
        assert_eq!(result.confidence, 52.86);
        assert!(!result.degraded);
    }

    #[test]
    fn test_aggregate_horizons() {
        let result = forecast(&[100.0, 200.0, 300.0, 400.0, 500.0], 3);
        assert_eq!(result.next_period, 600.0);
        assert_eq!(result.next_quarter, 2100.0);
        // 2100 × 12 / 3
        assert_eq!(result.next_year, 8400.0);

        let flat = forecast(&[10.0, 10.0, 10.0], 12);
        assert_eq!(flat.next_year, 120.0);
        assert_eq!(flat.confidence, 100.0);
    }

    #[test]
    fn test_short_history_degrades() {
        let result = forecast(&[120.0, 80.0], 4);
        assert!(result.degraded);
        assert_eq!(result.confidence, 0.0);
        assert!(result.points.iter().all(|p| p.prediction == 80.0));
        assert!(matches!(fit(&[1.0]), Err(Error::InsufficientData { needed: 3, got: 1 })));

        let empty = forecast(&[], 2);
        assert!(empty.points.iter().all(|p| p.prediction == 0.0));
    }

    #[test]
    fn test_predictions_never_negative() {
        let result = forecast(&[500.0, 300.0, 100.0], 3);
        assert!(result.points.iter().all(|p| p.prediction >= 0.0));
        assert_eq!(result.points[2].prediction, 0.0);
    }

    #[test]
    fn test_confidence_bounds() {
        for series in [vec![0.0, 0.0, 0.0], vec![1.0, 100.0, 1.0, 500.0], vec![5.0, 5.0, 6.0]] {
            let score = confidence_score(&series);
            assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn test_seasonal_adjustment_wraps_months() {
        let mut means = [Some(100.0); 12];
        means[0] = Some(130.0);
        means[11] = Some(70.0);
        let indices = seasonal_indices_from_means(&means);

        let result = forecast(&[100.0, 100.0, 100.0], 2);
        let adjusted = seasonally_adjusted(&result, 12, &indices);
        assert!(adjusted[0] < 100.0);
        assert!(adjusted[1] > 100.0);
    }
}
