//! Vehicle-miles-traveled and normalized crash-rate math.

use crate::{ANALYSIS_PERIOD_DAYS, ANALYSIS_YEARS};

/// Total vehicle-miles traveled on a segment over the analysis period.
#[must_use]
pub fn vehicle_miles_traveled(aadt: f64, length_mi: f64) -> f64 {
    aadt * length_mi * ANALYSIS_PERIOD_DAYS
}

/// Crashes per 100 million vehicle-miles traveled.
///
/// Returns `None` when the VMT denominator is zero, negative, or not a
/// number. An undefined rate is a defined sentinel here, never an
/// arithmetic failure.
#[must_use]
pub fn crash_rate_per_100m_vmt(crash_count: u64, vmt: f64) -> Option<f64> {
    if vmt > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let crashes = crash_count as f64;
        Some(crashes * 100_000_000.0 / vmt)
    } else {
        None
    }
}

/// Mean crashes per year over the analysis period.
#[must_use]
pub fn average_annual_crashes(crash_count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let count = crash_count as f64;
    count / ANALYSIS_YEARS.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_value_round_trip() {
        let vmt = vehicle_miles_traveled(5000.0, 10.0);
        assert!((vmt - 91_300_000.0).abs() < f64::EPSILON);
        let rate = crash_rate_per_100m_vmt(2, vmt).unwrap();
        assert!((rate - 2.190_58).abs() < 1e-4);
    }

    #[test]
    fn zero_vmt_is_undefined_not_an_error() {
        assert_eq!(crash_rate_per_100m_vmt(2, 0.0), None);
        assert_eq!(crash_rate_per_100m_vmt(2, -1.0), None);
        assert_eq!(crash_rate_per_100m_vmt(2, f64::NAN), None);
    }

    #[test]
    fn zero_crashes_yield_zero_rate() {
        let rate = crash_rate_per_100m_vmt(0, 91_300_000.0).unwrap();
        assert!(rate.abs() < f64::EPSILON);
    }

    #[test]
    fn annual_average_spreads_over_five_years() {
        assert!((average_annual_crashes(10) - 2.0).abs() < f64::EPSILON);
    }
}
