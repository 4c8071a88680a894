//! Domain error taxonomy for the fulfillment engine
//!
//! Gate failures carry the numbers that caused them so callers can render a
//! message such as "Paid 10000 vs required 12500 for 5 accepted" without
//! re-querying anything.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Errors produced by the pure engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Malformed or missing required input
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// A transition gate was not satisfied
    #[error("{0}")]
    PreconditionNotMet(GateFailure),

    #[error("{0} not found")]
    NotFound(String),

    /// The document changed between read and write
    #[error("{0} was modified concurrently, please retry")]
    ConcurrencyConflict(String),

    /// Internal bug, never user-triggered
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        DomainError::NotFound(entity.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::PreconditionNotMet(gate) => gate.code(),
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            DomainError::InvariantViolation(_) => "INVARIANT_VIOLATION",
        }
    }

    /// The gate that failed, if this is a precondition failure
    pub fn gate(&self) -> Option<&GateFailure> {
        match self {
            DomainError::PreconditionNotMet(gate) => Some(gate),
            _ => None,
        }
    }
}

impl From<GateFailure> for DomainError {
    fn from(gate: GateFailure) -> Self {
        DomainError::PreconditionNotMet(gate)
    }
}

/// One variant per transition gate reason code
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateFailure {
    #[error("Total amount must be set and greater than zero")]
    InvalidAmount,

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("At least one invoice is required before shipping")]
    MissingInvoice,

    #[error("At least one shipment is required")]
    MissingShipment,

    #[error("No payment has been recorded against this order")]
    NoPaymentRecorded,

    #[error("Justification notes are required: {detail}")]
    JustificationRequired { detail: String },

    #[error("Demand of {demand} is already met by {supply} from other purchase orders")]
    DemandAlreadyMet { supply: Decimal, demand: Decimal },

    #[error("A goods receipt note must be recorded first")]
    MissingGrn,

    #[error("{undelivered} shipment(s) not yet delivered")]
    ShipmentNotDelivered { undelivered: usize },

    #[error("A bill must be recorded first")]
    MissingBill,

    #[error("Paid {paid} vs required {required} for {accepted_quantity} accepted (tolerance {tolerance})")]
    PaymentMismatch {
        paid: Decimal,
        required: Decimal,
        accepted_quantity: Decimal,
        tolerance: Decimal,
    },

    #[error("Payment of {amount} exceeds pending amount {pending}")]
    AmountExceedsPending { amount: Decimal, pending: Decimal },

    #[error("Resolved yield percentage {yield_percentage} must be greater than zero")]
    InvalidYield { yield_percentage: Decimal },

    #[error("A goods receipt note already exists for this purchase order")]
    GrnAlreadyExists,

    #[error("A sales order already exists for this opportunity")]
    OrderAlreadyExists,

    #[error("{count} financial transaction(s) are attached")]
    HasFinancialTransactions { count: i64 },
}

impl GateFailure {
    pub fn code(&self) -> &'static str {
        match self {
            GateFailure::InvalidAmount => "INVALID_AMOUNT",
            GateFailure::InvalidTransition { .. } => "INVALID_TRANSITION",
            GateFailure::MissingInvoice => "MISSING_INVOICE",
            GateFailure::MissingShipment => "MISSING_SHIPMENT",
            GateFailure::NoPaymentRecorded => "NO_PAYMENT_RECORDED",
            GateFailure::JustificationRequired { .. } => "JUSTIFICATION_REQUIRED",
            GateFailure::DemandAlreadyMet { .. } => "DEMAND_ALREADY_MET",
            GateFailure::MissingGrn => "MISSING_GRN",
            GateFailure::ShipmentNotDelivered { .. } => "SHIPMENT_NOT_DELIVERED",
            GateFailure::MissingBill => "MISSING_BILL",
            GateFailure::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            GateFailure::AmountExceedsPending { .. } => "AMOUNT_EXCEEDS_PENDING",
            GateFailure::InvalidYield { .. } => "INVALID_YIELD",
            GateFailure::GrnAlreadyExists => "GRN_ALREADY_EXISTS",
            GateFailure::OrderAlreadyExists => "ORDER_ALREADY_EXISTS",
            GateFailure::HasFinancialTransactions { .. } => "HAS_FINANCIAL_TRANSACTIONS",
        }
    }
}

/// Result type alias for engine operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_payment_mismatch_message_carries_numbers() {
        let err: DomainError = GateFailure::PaymentMismatch {
            paid: Decimal::from(10000),
            required: Decimal::from(12500),
            accepted_quantity: Decimal::from(5),
            tolerance: Decimal::from(50),
        }
        .into();

        assert_eq!(err.code(), "PAYMENT_MISMATCH");
        let message = err.to_string();
        assert!(message.contains("10000"));
        assert!(message.contains("12500"));
    }

    #[test]
    fn test_gate_serializes_reason_tag() {
        let gate = GateFailure::AmountExceedsPending {
            amount: Decimal::from_str("1").unwrap(),
            pending: Decimal::ZERO,
        };
        let json = serde_json::to_value(&gate).unwrap();
        assert_eq!(json["reason"], "AMOUNT_EXCEEDS_PENDING");
    }

    #[test]
    fn test_justification_serializes_detail_beside_tag() {
        let gate = GateFailure::JustificationRequired {
            detail: "shipped 9 vs ordered 10".to_string(),
        };
        let json = serde_json::to_value(&gate).unwrap();
        assert_eq!(json["reason"], "JUSTIFICATION_REQUIRED");
        assert_eq!(json["detail"], "shipped 9 vs ordered 10");
    }

    #[test]
    fn test_non_gate_errors_have_no_gate() {
        assert!(DomainError::not_found("Invoice").gate().is_none());
        assert_eq!(DomainError::not_found("Invoice").to_string(), "Invoice not found");
    }
}
