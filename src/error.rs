use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a request handler can fail with. Broadcast delivery failures
/// are not represented here: they are contained at the fanout and never
/// reach a caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("not allowed")]
    Unauthorized,

    /// Transient; the whole batch may be retried safely because ingestion
    /// is idempotent by dedup key.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::StorageUnavailable(err) => tracing::error!(%err, "message store unreachable"),
            Self::Internal(err) => tracing::error!(%err, "request failed"),
            _ => {}
        }

        (
            self.status(),
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<axum::Error> for ApiError {
    fn from(err: axum::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.into())
    }
}
