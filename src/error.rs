//! API error taxonomy.
//!
//! `NotFound` on the entity being mutated aborts an operation before any
//! side effect runs. Failures occurring after the primary write (rule
//! execution, notification dispatch) are captured per unit of work and
//! logged; they never surface as a failure of the overall request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A referenced task, column, sub-task, group, or user is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Missing or invalid identity.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role.
    #[error("{0}")]
    Forbidden(String),

    /// An outbound webhook or notification send failed.
    #[error("delivery failed: {0}")]
    ExternalDeliveryFailure(String),

    /// Malformed request body.
    #[error("invalid request: {0}")]
    ValidationFailure(String),

    /// Server-side misconfiguration or unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ExternalDeliveryFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
