use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

/// HTTP-facing error body. Every error the client sees carries a stable code
/// and a trace id; raw exceptions never cross the edge.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(rename = "traceId")]
    pub trace_id: String,
}

impl ErrorBody {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trace_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Top-level HTTP edge error taxonomy (spec §7). Component-specific error
/// enums (`ProviderError`, `JobStoreError`, `PipelineError`, `AuthError`)
/// convert into this via `#[from]` or explicit mapping at the handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("missing session")]
    MissingSession,
    #[error("not found")]
    NotFound,
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
            ApiError::MissingSession => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "X-Session-Id header is required".to_string(),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "not found".to_string()),
            ApiError::JobFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SEARCH_FAILED", msg.clone())
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}
