//! Property-based tests for derived entry fields

use dieselsync::client::sync::calculations::{compute_rate, compute_usage, is_anomalous};
use dieselsync::shared::models::UsageUnit;
use proptest::prelude::*;

fn unit() -> impl Strategy<Value = UsageUnit> {
    prop_oneof![Just(UsageUnit::Hours), Just(UsageUnit::Kilometers)]
}

proptest! {
    #[test]
    fn test_usage_is_never_negative(start in 0.0f64..1e6, end in 0.0f64..1e6) {
        let usage = compute_usage(start, end);
        prop_assert!(usage >= 0.0);
        if end <= start {
            prop_assert_eq!(usage, 0.0);
        }
    }

    #[test]
    fn test_rate_is_finite_and_non_negative(unit in unit(), usage in 0.0f64..1e5, diesel in 0.0f64..2000.0) {
        let rate = compute_rate(unit, usage, diesel);
        prop_assert!(rate.is_finite());
        prop_assert!(rate >= 0.0);
    }

    #[test]
    fn test_zero_denominator_gives_zero(diesel in 0.0f64..2000.0, usage in 0.0f64..1e5) {
        prop_assert_eq!(compute_rate(UsageUnit::Hours, 0.0, diesel), 0.0);
        prop_assert_eq!(compute_rate(UsageUnit::Kilometers, usage, 0.0), 0.0);
    }

    #[test]
    fn test_expected_rate_is_never_anomalous(expected in 0.01f64..100.0, tolerance in 0.0f64..1.0) {
        prop_assert!(!is_anomalous(expected, expected, tolerance));
    }
}
