//! Mapping of engine errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streambox_core::StreamboxError;

/// Error returned by every API handler.
///
/// Serialized as `{"error": <message>, "retryable": <bool>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] StreamboxError),

    #[error("Bad request: {reason}")]
    BadRequest { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl ApiError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        ApiError::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(error) => match error {
                StreamboxError::InvalidIdentifier { .. }
                | StreamboxError::InvalidSetting { .. } => StatusCode::BAD_REQUEST,
                StreamboxError::NotFound { .. } => StatusCode::NOT_FOUND,
                StreamboxError::MetadataTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                StreamboxError::Swarm(_) => StatusCode::BAD_GATEWAY,
                StreamboxError::EngineShutdown => StatusCode::SERVICE_UNAVAILABLE,
                StreamboxError::SettingsStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Engine(error) => error.is_retryable(),
            ApiError::BadRequest { .. } | ApiError::Internal { .. } => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self);
        } else {
            tracing::debug!("Request rejected with {}: {}", status, self);
        }

        let body = json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}
