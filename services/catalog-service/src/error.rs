// =============================================================================
// ERROR MODULE
// =============================================================================
// Error taxonomy of the service and its HTTP mapping.
//
// - Validation / InvalidState -> 400
// - NotFound                  -> 404
// - Database / Internal       -> 500 (details logged, generic message returned)
//
// HOW ERRORS FLOW:
// Business code (discounts, subscribers) returns `AppResult<T>`. The store
// layer returns `anyhow::Result<T>`; the `?` operator calls
// `From<anyhow::Error>` below to turn those into `AppError` on the way up.
// Handlers return `AppResult<Json<T>>`, and axum calls `into_response()` on
// the error variant, so every failure leaves the service as
//
//   { "success": false, "error": "...", "code": "VALIDATION_ERROR" }
//
// Request bodies that do not deserialize go through the same path via
// `From<JsonRejection>`, so they too answer 400 with this body.
// =============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// =============================================================================
// CUSTOM ERROR TYPE
// =============================================================================
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or format
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entity exists but the operation is not permitted in its current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Database query or transaction failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// =============================================================================
// HTTP RESPONSE CONVERSION
// =============================================================================
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::InvalidState(msg) => {
                tracing::warn!(error_code = code, message = %msg, "Request rejected");
                msg.clone()
            }
            // Never leak internals to the caller
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error_code = code, error = %self, "Request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

// =============================================================================
// RESULT TYPE ALIAS
// =============================================================================
pub type AppResult<T> = Result<T, AppError>;

// =============================================================================
// CONVERSION HELPERS
// =============================================================================
// Store and config code uses anyhow; database failures keep their own variant.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(db_err) => AppError::Database(db_err),
            Err(err) => AppError::Internal(format!("{err:#}")),
        }
    }
}

// A malformed or mistyped JSON body is a caller mistake like any other.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidState("inactive".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anyhow_errors_become_internal() {
        let err: AppError = anyhow::anyhow!("store unavailable").into();
        assert!(matches!(err, AppError::Internal(msg) if msg.contains("store unavailable")));
    }

    #[test]
    fn sqlx_errors_keep_database_variant() {
        let err: AppError = anyhow::Error::new(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal("secret connection string".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
