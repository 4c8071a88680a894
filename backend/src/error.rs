//! Error handling for the Trade Fulfillment Engine
//!
//! Gate failures are returned as structured, user-displayable responses that
//! keep the numbers behind the rejection.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Engine errors (validation, gates, not found, conflicts, invariants)
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),
}

impl AppError {
    /// Shorthand for an input validation failure
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Domain(DomainError::validation(field, message))
    }

    pub fn not_found(entity: &str) -> Self {
        AppError::Domain(DomainError::not_found(entity))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => {
                    return AppError::Domain(DomainError::ConcurrencyConflict(
                        db_err.table().unwrap_or("record").to_string(),
                    ));
                }
                // unique_violation, foreign_key_violation
                Some("23505") | Some("23503") => {
                    return AppError::Conflict(db_err.message().to_string());
                }
                // check_violation: the engine tried to persist an invalid state
                Some("23514") => {
                    return AppError::Domain(DomainError::InvariantViolation(
                        db_err.message().to_string(),
                    ));
                }
                _ => {}
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by_key(|(field, _)| **field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::validation(field, message)
            }
            None => AppError::validation("input", "Invalid input"),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Numbers behind a gate failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        let detail = |code: &str, message: String| ErrorDetail {
            code: code.to_string(),
            message,
            field: None,
            details: None,
        };

        match self {
            AppError::Domain(domain) => {
                let status = match domain {
                    DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
                    DomainError::PreconditionNotMet(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                    DomainError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
                    DomainError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let field = match domain {
                    DomainError::Validation { field, .. } => Some(field.clone()),
                    _ => None,
                };
                let details = domain
                    .gate()
                    .and_then(|gate| serde_json::to_value(gate).ok());
                (
                    status,
                    ErrorDetail {
                        code: domain.code().to_string(),
                        message: domain.to_string(),
                        field,
                        details,
                    },
                )
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, detail("UNAUTHORIZED", msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, detail("CONFLICT", msg.clone())),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("DATABASE_ERROR", "A database error occurred".to_string()),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
