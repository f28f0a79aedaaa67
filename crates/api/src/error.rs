use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tollsync_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `tollsync_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A malformed request parameter the domain never saw.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Status, stable error code and client-facing message.
    ///
    /// Internal details are logged here and replaced by a generic message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "ALREADY_EXISTS", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg.clone()),
        }
    }

    /// The `{ "error", "code" }` body shared by HTTP responses and
    /// WebSocket error frames.
    pub fn body(&self) -> serde_json::Value {
        let (_, code, message) = self.parts();
        error_body(code, &message)
    }
}

fn error_body(code: &str, message: &str) -> serde_json::Value {
    json!({
        "error": message,
        "code": code,
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        (status, axum::Json(error_body(code, &message))).into_response()
    }
}
