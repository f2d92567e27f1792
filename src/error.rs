use thiserror::Error;

use crate::types::Month;

/// Errors produced by the forecasting core.
///
/// Validation errors are raised by a parameter set's `validate()` before any
/// row is produced; a forecast never starts from an invalid set. Computation
/// errors mean a derived quantity broke its invariant mid-run (a model
/// defect, not a user error) and abort only the run that produced them. The
/// models are deterministic, so computation errors are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Malformed or out-of-range parameter set.
    #[error("invalid parameter `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// A derived quantity fell outside its required invariant mid-run.
    #[error("computation error at month {}: {quantity} = {value}", month.0)]
    Computation {
        month: Month,
        quantity: &'static str,
        value: f64,
    },
}

impl ForecastError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ForecastError::Validation { field, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Reject a non-finite or negative quantity with the offending month and name.
pub fn ensure_non_negative(value: f64, quantity: &'static str, month: Month) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ForecastError::Computation { month, quantity, value })
    }
}

/// Validate that `value` lies in `[0, 1]`.
pub fn ensure_share(value: f64, field: &'static str) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ForecastError::validation(field, format!("share {value} outside [0, 1]")))
    }
}

/// Validate that `value` is finite and non-negative (prices, volumes, rates).
pub fn ensure_positive_or_zero(value: f64, field: &'static str) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ForecastError::validation(field, format!("{value} must be >= 0")))
    }
}
