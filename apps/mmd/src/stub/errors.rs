use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// One entry of a FastAPI-style 422 `detail` array.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDetail {
    pub loc: Vec<String>,
    pub msg: String,
    pub input: serde_json::Value,
}

/// Stub backend error type.
/// Implements `IntoResponse` so handlers can return `Result<T, StubError>`.
#[derive(Debug, Error)]
pub enum StubError {
    #[error("Session expired")]
    SessionExpired,

    #[error("Validation failed")]
    Validation(Vec<FieldDetail>),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            StubError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "detail": "세션이 만료되었습니다.",
                    "code": "SESSION_EXPIRED"
                }),
            ),
            StubError::Validation(details) => {
                tracing::warn!("Rejecting request with {} invalid field(s)", details.len());
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "detail": details }),
                )
            }
            StubError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({
                    "detail": format!("{what} not found"),
                    "code": "NOT_FOUND"
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
