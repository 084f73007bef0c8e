//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors (validation and authorization)
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Store errors (not-found, conflict, infrastructure)
    #[error(transparent)]
    Store(#[from] StoreError),

    // Server errors (5xx)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            AppError::Domain(domain_err) => match domain_err {
                // 403 Forbidden: acting identity does not own the resource.
                // The body never names the true owner.
                DomainError::Unauthorized(msg) => {
                    (StatusCode::FORBIDDEN, "unauthorized", Some(msg.clone()))
                }
                // 400: caller supplied malformed or out-of-range data
                _ => (
                    StatusCode::BAD_REQUEST,
                    "validation_failed",
                    Some(domain_err.to_string()),
                ),
            },

            AppError::Store(store_err) => match store_err {
                // 404 Not Found
                StoreError::InvestmentNotFound(id) => {
                    (StatusCode::NOT_FOUND, "investment_not_found", Some(id.to_string()))
                }
                StoreError::ProjectNotFound(id) => {
                    (StatusCode::NOT_FOUND, "project_not_found", Some(id.to_string()))
                }
                StoreError::AccountNotFound(email) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(email.clone()))
                }
                StoreError::UserNotFound(id) => {
                    (StatusCode::NOT_FOUND, "user_not_found", Some(id.to_string()))
                }

                // 409 Conflict
                StoreError::AccountAlreadyExists(email) => {
                    (StatusCode::CONFLICT, "account_already_exists", Some(email.clone()))
                }
                StoreError::Conflict(_) => {
                    tracing::warn!("Write conflict after retries: {}", store_err);
                    (StatusCode::CONFLICT, "write_conflict", None)
                }

                // 500 Internal Server Error
                StoreError::Constraint(msg) => {
                    tracing::error!("Constraint violation: {}", msg);
                    (StatusCode::INTERNAL_SERVER_ERROR, "constraint_violation", None)
                }
                StoreError::TransactionStart(e) => {
                    tracing::error!("Failed to start transaction: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "transaction_error", None)
                }
                StoreError::Database(e) => {
                    tracing::error!("Database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
