//! Derived fields stamped on log entries.
//!
//! Values are kept at full precision; rounding is left to whoever displays them.

use crate::shared::models::UsageUnit;

/// Meter advance between two readings; never negative
pub fn compute_usage(start_reading: f64, end_reading: f64) -> f64 {
    (end_reading - start_reading).max(0.0)
}

/// Consumption rate in the unit's convention
///
/// Distance machines report km per litre (`usage / diesel`), hour-meter
/// machines litres per hour (`diesel / usage`). A zero denominator gives 0.
pub fn compute_rate(unit: UsageUnit, usage: f64, diesel_filled: f64) -> f64 {
    let (numerator, denominator) = if unit.is_distance() {
        (usage, diesel_filled)
    } else {
        (diesel_filled, usage)
    };
    if denominator <= 0.0 {
        return 0.0;
    }
    let rate = numerator / denominator;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}

/// Relative deviation of `rate` from `expected`; `None` without a usable baseline
pub fn rate_deviation(rate: f64, expected: f64) -> Option<f64> {
    if !expected.is_finite() || expected <= 0.0 || rate <= 0.0 {
        return None;
    }
    Some((rate - expected).abs() / expected)
}

pub fn is_anomalous(rate: f64, expected: f64, tolerance: f64) -> bool {
    rate_deviation(rate, expected).is_some_and(|deviation| deviation > tolerance)
}
