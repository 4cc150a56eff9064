//! HTTP error mapping (§7 Error Handling Design).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use scheduler_core::Error as CoreError;

pub type AppResult<T> = Result<T, ApiError>;

/// Wraps the core error taxonomy at the HTTP boundary, mapping each kind
/// onto the status code §7 specifies.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::AlreadyExists(_) => StatusCode::CONFLICT,
            CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoreError::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::SchedulingConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Database(_) | CoreError::Serialization(_) | CoreError::Fatal(_) => {
                tracing::error!(error = %err, "internal invariant or storage error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
