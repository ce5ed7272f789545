use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pullbox_engine::CacheError;
use thiserror::Error;
use tracing::warn;

/// Request-level error, mapped to an HTTP status at the boundary.
///
/// Clients only ever see a status code and a short generic detail; retry
/// counts and internal paths stay in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request component: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::InvalidName(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            ApiError::Cache(err) => match err {
                CacheError::PathTraversal { .. } => (StatusCode::BAD_REQUEST, "Invalid path"),
                CacheError::MissingEntry { .. } | CacheError::UpstreamNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "Artifact not found")
                }
                // Proxy the upstream's own status where it is a valid code.
                CacheError::UpstreamStatus { status } => (
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                    "Upstream error",
                ),
                CacheError::Transient { .. } => {
                    (StatusCode::BAD_GATEWAY, "Upstream request failed")
                }
                CacheError::LocalIo { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Cache failure")
                }
            },
        };
        if status.is_server_error() {
            warn!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, detail).into_response()
    }
}

/// Fatal startup failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine error: {0}")]
    Engine(#[from] CacheError),

    #[error("initialization error: {0}")]
    Initialization(String),
}
