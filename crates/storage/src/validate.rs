//! Range Validation
//!
//! Ingestion-time gates for telemetry and control inputs. Values outside
//! their nominal range are rejected before any state mutation; the scorer
//! clamps instead, so this module is the only place out-of-range data is
//! turned away.

use thiserror::Error;

/// Valid relative humidity range in percent.
pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);

/// Valid heart-rate range in bpm. Zero is additionally accepted as the
/// "no wearable data yet" placeholder.
pub const HEART_RATE_RANGE: (i32, i32) = (30, 220);

/// Valid speaker volume range.
pub const VOLUME_RANGE: (i32, i32) = (0, 100);

/// Valid automation humidity-threshold range in percent.
pub const HUMIDITY_THRESHOLD_RANGE: (f64, f64) = (0.0, 100.0);

/// Valid automation heart-rate-threshold range in bpm.
pub const HEART_RATE_THRESHOLD_RANGE: (i32, i32) = (40, 200);

/// Malformed or out-of-range input at a boundary. Rejected synchronously
/// with no state mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("not a numeric payload: {0}")]
    NotNumeric(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid status {0:?}, expected \"on\" or \"off\"")]
    InvalidStatus(String),
}

fn check_range(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<(), ValidationError> {
    // NaN fails both comparisons and is rejected here.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

pub fn validate_humidity(humidity: f64) -> Result<(), ValidationError> {
    check_range("humidity", humidity, HUMIDITY_RANGE)
}

pub fn validate_heart_rate(heart_rate: i32) -> Result<(), ValidationError> {
    if heart_rate == 0 {
        return Ok(());
    }
    check_range(
        "heartRate",
        f64::from(heart_rate),
        (f64::from(HEART_RATE_RANGE.0), f64::from(HEART_RATE_RANGE.1)),
    )
}

pub fn validate_volume(volume: i32) -> Result<(), ValidationError> {
    check_range(
        "volume",
        f64::from(volume),
        (f64::from(VOLUME_RANGE.0), f64::from(VOLUME_RANGE.1)),
    )
}

pub fn validate_humidity_threshold(threshold: f64) -> Result<(), ValidationError> {
    check_range("humidityThreshold", threshold, HUMIDITY_THRESHOLD_RANGE)
}

pub fn validate_heart_rate_threshold(threshold: i32) -> Result<(), ValidationError> {
    check_range(
        "heartRateThreshold",
        f64::from(threshold),
        (
            f64::from(HEART_RATE_THRESHOLD_RANGE.0),
            f64::from(HEART_RATE_THRESHOLD_RANGE.1),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humidity_bounds() {
        assert!(validate_humidity(0.0).is_ok());
        assert!(validate_humidity(55.5).is_ok());
        assert!(validate_humidity(100.0).is_ok());
        assert!(validate_humidity(-0.1).is_err());
        assert!(validate_humidity(100.1).is_err());
        assert!(validate_humidity(f64::NAN).is_err());
    }

    #[test]
    fn test_heart_rate_bounds() {
        assert!(validate_heart_rate(30).is_ok());
        assert!(validate_heart_rate(220).is_ok());
        assert!(validate_heart_rate(29).is_err());
        assert!(validate_heart_rate(221).is_err());
    }

    #[test]
    fn test_heart_rate_zero_placeholder_accepted() {
        assert!(validate_heart_rate(0).is_ok());
    }

    #[test]
    fn test_volume_bounds() {
        assert!(validate_volume(0).is_ok());
        assert!(validate_volume(100).is_ok());
        assert!(validate_volume(-1).is_err());
        assert!(validate_volume(101).is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_humidity_threshold(40.0).is_ok());
        assert!(validate_humidity_threshold(-5.0).is_err());
        assert!(validate_heart_rate_threshold(40).is_ok());
        assert!(validate_heart_rate_threshold(200).is_ok());
        assert!(validate_heart_rate_threshold(39).is_err());
        assert!(validate_heart_rate_threshold(201).is_err());
    }

    #[test]
    fn test_error_message_names_field() {
        let err = validate_humidity(120.0).unwrap_err();
        assert!(err.to_string().contains("humidity"));
        assert!(err.to_string().contains("120"));
    }
}
