//! # API Error Type
//!
//! What HTTP callers receive when an action fails.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GatewayError (root cause, through any Invocation layers)               │
//! │                                                                         │
//! │  Validation        ──► 400 VALIDATION_ERROR   message shown            │
//! │  NotFound          ──► 404 NOT_FOUND          message shown            │
//! │  PermissionDenied  ──► 403 PERMISSION_DENIED  message shown            │
//! │  StoreUnavailable  ──► 503 STORE_UNAVAILABLE  generic message          │
//! │  anything else     ──► 500 INTERNAL           generic message          │
//! │                                                                         │
//! │  The detail of 5xx errors is logged, never returned.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Body
//! ```json
//! {
//!   "code": "NOT_FOUND",
//!   "message": "cell not found: tax/nope"
//! }
//! ```

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use cell_gateway::GatewayError;

/// Error body returned by every route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Unknown cell, action or resource (404)
    NotFound,

    /// Refused by the permission service (403)
    PermissionDenied,

    /// The store could not serve the request (503)
    StoreUnavailable,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error with a generic message.
    pub fn internal() -> Self {
        ApiError::new(ErrorCode::Internal, "An internal error occurred")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Conversions
// =============================================================================

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err.root() {
            GatewayError::Validation(e) => ApiError::validation(e.to_string()),
            root @ GatewayError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, root.to_string()),
            root @ GatewayError::PermissionDenied(_) => {
                ApiError::new(ErrorCode::PermissionDenied, root.to_string())
            }
            GatewayError::StoreUnavailable(_) => {
                warn!(error = %err, "Store unavailable");
                ApiError::new(ErrorCode::StoreUnavailable, "Service temporarily unavailable")
            }
            _ => {
                error!(error = %err, "Action failed");
                ApiError::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(format!("Request body must be a JSON object: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}
