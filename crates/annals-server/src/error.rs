//! The one mapping from failures to HTTP responses

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use annals_core::{AnnalsError, ErrorKind, ValidationError};

/// Error returned by every handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] AnnalsError),

    /// Credentials did not match an active user
    #[error("{0}")]
    Unauthorized(String),

    /// Request body could not be read at all
    #[error("{0}")]
    BadRequest(String),

    /// The worker running the request went away
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Storage | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Core(e) => e.kind().as_str(),
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Core(AnnalsError::Validation(e)) => e.to_string(),
            ApiError::Core(AnnalsError::NotFound(what)) => format!("{} not found", what),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.message()
        };

        let body = Json(serde_json::json!({
            "success": false,
            "kind": self.kind(),
            "message": message,
        }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON of the wrong shape, unknown keys included
            JsonRejection::JsonDataError(e) => ApiError::Core(
                ValidationError::InvalidValue {
                    field: "body".into(),
                    reason: e.body_text(),
                }
                .into(),
            ),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}
