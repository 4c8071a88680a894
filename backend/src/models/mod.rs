//! Database models for the Trade Fulfillment Engine
//!
//! Re-exports models from the shared crate and adds decoding helpers for
//! status columns stored as text.

pub use shared::models::*;

use rust_decimal::Decimal;
use shared::DomainError;
use validator::ValidationError;

use crate::error::AppError;

/// Decode a text status column, treating unknown values as corrupt data
pub fn decode<T>(raw: &str, column: &str, parse: fn(&str) -> Option<T>) -> Result<T, AppError> {
    parse(raw).ok_or_else(|| {
        AppError::Domain(DomainError::InvariantViolation(format!(
            "unknown {} value '{}'",
            column, raw
        )))
    })
}

/// `validator` adapter for strictly positive decimals
pub fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    shared::validate_positive(*value).map_err(|msg| {
        let mut err = ValidationError::new("positive");
        err.message = Some(msg.into());
        err
    })
}

/// `validator` adapter for non-negative decimals
pub fn non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    shared::validate_non_negative(*value).map_err(|msg| {
        let mut err = ValidationError::new("non_negative");
        err.message = Some(msg.into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_status() {
        let status = decode("PAID", "status", InvoiceStatus::from_str).unwrap();
        assert_eq!(status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_decode_unknown_status_is_invariant_violation() {
        let err = decode("SETTLED", "status", InvoiceStatus::from_str).unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_positive_decimal_adapter() {
        assert!(positive_decimal(&Decimal::ONE).is_ok());
        let err = positive_decimal(&Decimal::ZERO).unwrap_err();
        assert_eq!(err.code, "positive");
    }
}
