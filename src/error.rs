//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::DateTime;
use serde_json::json;

use crate::services::validator::ValidationError;

/// Message returned for any failure whose details must not reach the caller.
const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// Message returned when the upstream search could not be completed.
const UPSTREAM_ERROR_MESSAGE: &str = "Error retrieving data.";

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Authentication Errors**: missing, malformed or unknown API keys
/// - **Authorization Errors**: key issuance from a foreign origin or with a wrong secret
/// - **Quota Errors**: the key has no requests left in the current window
/// - **Validation Errors**: invalid search payload or issuance body
/// - **Upstream Errors**: the product search failed or timed out
/// - **Database Errors**: any sqlx::Error from database operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No `X-API-Key` header was sent.
    #[error("No API Key provided")]
    MissingApiKey,

    /// The presented credential is not a UUID v4.
    #[error("API Key must be a valid UUID v4")]
    MalformedApiKey,

    /// The credential is well formed but unknown or inactive.
    #[error("Invalid API Key")]
    InvalidApiKey,

    /// Key issuance was attempted with the wrong shared secret.
    #[error("Unauthorized")]
    Unauthorized,

    /// Key issuance was attempted from an address that is not allow-listed.
    #[error("Forbidden")]
    Forbidden,

    /// The request body is not JSON.
    #[error("Request must be JSON")]
    MalformedBody,

    /// A search payload field failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// A key already exists for the email address.
    #[error("An API key for this email already exists!")]
    DuplicateEmail,

    /// The key used up its quota; carries the epoch second at which the window resets.
    #[error("Rate limited: Try again after {}", format_reset_time(.resets_at))]
    QuotaExceeded { resets_at: i64 },

    /// The upstream answered successfully but without any items.
    #[error("Error scraping data: no items returned")]
    NoItems,

    /// The upstream returned errors, a non-success status or an unreadable body.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The upstream could not be reached or did not answer in time.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An invariant the store should guarantee did not hold.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Render an epoch second as `YYYY-MM-DD HH:MM:SS` (UTC).
fn format_reset_time(epoch_seconds: &i64) -> String {
    DateTime::from_timestamp(*epoch_seconds, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingApiKey
            | AppError::MalformedApiKey
            | AppError::InvalidApiKey
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MalformedBody => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Validation(_)
            | AppError::InvalidRequest(_)
            | AppError::DuplicateEmail
            | AppError::NoItems => StatusCode::BAD_REQUEST,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_)
            | AppError::Transport(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "error": "Human-readable error message"
/// }
/// ```
///
/// Upstream, transport, database and internal failures are logged here and
/// replaced by a generic message so their details never reach the caller.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Upstream(detail) | AppError::Transport(detail) => {
                tracing::error!(error = %detail, "Search request failed");
                UPSTREAM_ERROR_MESSAGE.to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database operation failed");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}
