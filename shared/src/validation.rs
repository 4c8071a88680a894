//! Input validation helpers for the fulfillment engine

use rust_decimal::Decimal;

// ============================================================================
// Amount and Quantity Validations
// ============================================================================

/// Validate that a monetary amount or quantity is strictly positive
pub fn validate_positive(value: Decimal) -> Result<(), &'static str> {
    if value <= Decimal::ZERO {
        return Err("Value must be greater than zero");
    }
    Ok(())
}

/// Validate that a quantity is not negative
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    Ok(())
}

/// Validate a percentage is within 0-100
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate GRN quantities: accepted + rejected cannot exceed total received
pub fn validate_grn_quantities(
    total_received: Decimal,
    accepted: Decimal,
    rejected: Decimal,
) -> Result<(), &'static str> {
    if total_received < Decimal::ZERO || accepted < Decimal::ZERO || rejected < Decimal::ZERO {
        return Err("Received quantities cannot be negative");
    }
    if accepted + rejected > total_received {
        return Err("Accepted and rejected quantities exceed total received");
    }
    Ok(())
}

// ============================================================================
// Document Validations
// ============================================================================

/// Validate an invoice or bill number (1-64 printable characters)
pub fn validate_document_number(number: &str) -> Result<(), &'static str> {
    let trimmed = number.trim();
    if trimmed.is_empty() {
        return Err("Document number is required");
    }
    if trimmed.len() > 64 {
        return Err("Document number must be at most 64 characters");
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err("Document number contains invalid characters");
    }
    Ok(())
}

/// Validate a tracking number when present
pub fn validate_tracking_number(tracking: Option<&str>) -> Result<(), &'static str> {
    match tracking {
        Some(t) if t.trim().is_empty() => Err("Tracking number cannot be blank"),
        Some(t) if t.len() > 100 => Err("Tracking number must be at most 100 characters"),
        _ => Ok(()),
    }
}
