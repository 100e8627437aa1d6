//! Money and arithmetic guards.
//!
//! Money is `Decimal` at two decimal places, hours at one. Every division in
//! the core goes through [`ratio`] or [`percent_change`] so a zero
//! denominator yields a documented fallback instead of NaN or infinity.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places of money values
pub const MONEY_SCALE: u32 = 2;
/// Decimal places of hour values
pub const HOURS_SCALE: u32 = 1;

/// Rounds half away from zero and pads to exactly `dp` decimal places.
#[must_use]
pub fn rescale(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

/// Converts a storage real into money. Non-finite input becomes zero.
#[must_use]
pub fn money(value: f64) -> Decimal {
    rescale(Decimal::from_f64(finite(value)).unwrap_or_default(), MONEY_SCALE)
}

/// Converts a storage real into hours. Non-finite input becomes zero.
#[must_use]
pub fn hours(value: f64) -> Decimal {
    rescale(Decimal::from_f64(finite(value)).unwrap_or_default(), HOURS_SCALE)
}

/// Sum of money values, kept at money scale.
pub fn sum_money<'a, I>(values: I) -> Decimal
where
    I: IntoIterator<Item = &'a Decimal>,
{
    rescale(values.into_iter().sum(), MONEY_SCALE)
}

/// Lossy conversion for ratio arithmetic.
#[must_use]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().map_or(0.0, finite)
}

/// Replaces NaN and infinities with zero.
#[must_use]
pub const fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// `numerator / denominator`, or zero when the denominator is zero.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite(numerator / denominator)
}

/// Money division at money scale; zero denominator yields zero.
#[must_use]
pub fn money_ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator
        .checked_div(denominator)
        .map_or(Decimal::ZERO, |value| rescale(value, MONEY_SCALE))
}

/// Percent change from `previous` to `current`; `None` unless `previous > 0`.
#[must_use]
pub fn percent_change(current: f64, previous: f64) -> Option<f64> {
    (previous > 0.0).then(|| finite((current - previous) / previous * 100.0))
}

/// Rounds to `dp` decimal places for display-stable floats.
#[must_use]
pub fn round_to(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    finite((value * factor).round() / factor)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_money_has_two_decimal_places() {
        assert_eq!(money(1000.0).to_string(), "1000.00");
        assert_eq!(money(0.1 + 0.2).to_string(), "0.30");
        assert_eq!(money(2.005).scale(), 2);
    }

    #[test]
    fn test_hours_has_one_decimal_place() {
        assert_eq!(hours(7.25).to_string(), "7.3");
        assert_eq!(hours(8.0).to_string(), "8.0");
    }

    #[test]
    fn test_non_finite_becomes_zero() {
        assert_eq!(money(f64::NAN), Decimal::ZERO);
        assert_eq!(finite(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(5.0, 2.0), 2.5);
        assert_eq!(money_ratio(dec("10"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(money_ratio(dec("10"), dec("4")), dec("2.50"));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(150.0, 100.0), Some(50.0));
        assert_eq!(percent_change(150.0, 0.0), None);
        assert_eq!(percent_change(50.0, 100.0), Some(-50.0));
    }

    #[test]
    fn test_sum_money() {
        let values = [dec("1.10"), dec("2.20"), dec("3")];
        assert_eq!(sum_money(&values).to_string(), "6.30");
    }
}
