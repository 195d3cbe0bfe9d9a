//! Conversions between module-native time units and scenario epoch seconds.
//!
//! Module backends report their clocks in an arbitrary unit ("s", "hr", ...).
//! Everything outside the backend works in whole seconds since the scenario
//! epoch, so each module carries a multiplicative factor derived here.

use crate::errors::{CoupleError, CoupleResult};

/// Seconds since the scenario epoch.
pub type EpochSeconds = i64;

/// Multiplicative factor taking one of the recognised time-unit spellings to
/// seconds.
pub fn seconds_per_unit(unit: &str) -> CoupleResult<f64> {
    let factor = match unit.trim() {
        "s" | "sec" | "second" | "seconds" => 1.0,
        "min" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86400.0,
        other => return Err(CoupleError::InvalidTimeUnit(other.to_string())),
    };
    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognised_units() {
        assert_eq!(seconds_per_unit("s").unwrap(), 1.0);
        assert_eq!(seconds_per_unit("seconds").unwrap(), 1.0);
        assert_eq!(seconds_per_unit("min").unwrap(), 60.0);
        assert_eq!(seconds_per_unit("hr").unwrap(), 3600.0);
        assert_eq!(seconds_per_unit(" hours ").unwrap(), 3600.0);
        assert_eq!(seconds_per_unit("d").unwrap(), 86400.0);
    }

    #[test]
    fn unknown_unit_errors() {
        let err = seconds_per_unit("fortnights").unwrap_err();
        assert!(matches!(err, CoupleError::InvalidTimeUnit(u) if u == "fortnights"));
    }
}
