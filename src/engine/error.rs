//! Engine validation errors.

use thiserror::Error;

/// Reasons an engine call is rejected before any computation happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{field} must be greater than zero (got {value})")]
    InvalidDivisor { field: &'static str, value: f64 },
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("{field} out of range: {value} not in {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Reject NaN and infinities for a required input.
pub(crate) fn require_finite(field: &'static str, value: f64) -> Result<f64, EngineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::NonFinite { field })
    }
}

/// A required divisor must be finite and strictly positive.
pub(crate) fn require_divisor(field: &'static str, value: f64) -> Result<f64, EngineError> {
    let value = require_finite(field, value)?;
    if value <= 0.0 {
        return Err(EngineError::InvalidDivisor { field, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_rules() {
        assert_eq!(require_divisor("fio2", 21.0), Ok(21.0));
        assert_eq!(
            require_divisor("fio2", 0.0),
            Err(EngineError::InvalidDivisor { field: "fio2", value: 0.0 })
        );
        assert!(matches!(
            require_divisor("respiratory_rate", -4.0),
            Err(EngineError::InvalidDivisor { .. })
        ));
        assert_eq!(
            require_divisor("spo2", f64::NAN),
            Err(EngineError::NonFinite { field: "spo2" })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::OutOfRange { field: "mobilization_level", value: 7, min: 0, max: 4 };
        assert_eq!(err.to_string(), "mobilization_level out of range: 7 not in 0..=4");
    }
}
