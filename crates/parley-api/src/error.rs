//! API error handling
//!
//! Domain errors keep their stable codes; the HTTP status follows the
//! error's category.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_types::{ErrorKind, ParleyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] ParleyError),

    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ApiError {
    /// Stable error code for clients
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Domain(err) => err.error_code(),
            Self::MissingHeader(_) => "MISSING_HEADER",
            Self::InvalidHeader { .. } => "INVALID_HEADER",
            Self::InvalidRequestBody(_) => "INVALID_REQUEST_BODY",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Domain(err) => match err {
                ParleyError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
                ParleyError::DuplicateRecord { .. } | ParleyError::RefundAlreadyApplied { .. } => {
                    StatusCode::CONFLICT
                }
                other => match other.kind() {
                    ErrorKind::Input => StatusCode::BAD_REQUEST,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
                    ErrorKind::Balance => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
            Self::MissingHeader(_)
            | Self::InvalidHeader { .. }
            | Self::InvalidRequestBody(_)
            | Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code
    pub code: String,
    /// Human-readable error message
    pub msg: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let msg = match err {
            // don't leak storage details to callers
            ApiError::Domain(e) if e.kind() == ErrorKind::Infrastructure => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            code: err.error_code().to_string(),
            msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequestBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidParameter(rejection.body_text())
    }
}
