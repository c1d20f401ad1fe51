use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use iris_index::IndexError;
use iris_llm::LlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Request-level failure, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::InvalidImage(msg) => Self::InvalidImage(msg),
            LlmError::UpstreamUnavailable(msg) => Self::Upstream(msg),
            e if e.is_upstream() => Self::Upstream(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Embedding(inner) => inner.into(),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("request failed: {self}");
        } else {
            tracing::debug!("request rejected ({status}): {self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
