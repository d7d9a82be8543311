//! Precondition errors for core values.
//!
//! The core operations themselves never fail on well-formed input; these
//! errors are raised when a window or parameter set is constructed.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised when constructing core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Window start is after its end.
    #[error("inverted date window: start {start} is after end {end}")]
    InvertedWindow {
        /// Requested start date.
        start: NaiveDate,
        /// Requested end date.
        end: NaiveDate,
    },

    /// Expiry string is not in `DD-Mon-YYYY` form.
    #[error("invalid expiry date: {0}")]
    InvalidExpiry(String),

    /// Parameter outside its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl CoreError {
    /// Creates an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_window_message_names_both_dates() {
        let err = CoreError::InvertedWindow {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-03-01"));
        assert!(msg.contains("2024-01-01"));
    }

    #[test]
    fn invalid_parameter_message() {
        let err = CoreError::invalid_parameter("stop_loss_fraction", "must be >= 0");
        assert_eq!(
            err.to_string(),
            "invalid parameter stop_loss_fraction: must be >= 0"
        );
    }
}
