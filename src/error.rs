//! Error types for Anton.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures talking to the external backend (the upstream of the proxy).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Backend {operation} unreachable: {reason}")]
    Transport { operation: String, reason: String },

    #[error("Backend {operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Backend {operation} returned {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from backend {operation}: {reason}")]
    Decode { operation: String, reason: String },
}

impl GatewayError {
    /// Classify a reqwest failure for the given operation.
    pub(crate) fn from_reqwest(operation: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                operation: operation.to_string(),
                timeout,
            }
        } else if err.is_decode() {
            Self::Decode {
                operation: operation.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Transport {
                operation: operation.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Errors surfaced by the proxy endpoints. Each maps to a JSON envelope
/// `{"error": "..."}` with an explicit status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown action")]
    UnknownAction,

    /// Generic failure; the message is what the caller sees, never the cause.
    #[error("{0}")]
    Service(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownAction => StatusCode::BAD_REQUEST,
            Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Failures of the browser-side client talking to the same-origin proxy.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The proxy could not be reached at all (includes timeouts).
    #[error("Proxy unreachable: {0}")]
    Transport(String),

    /// The proxy answered with a non-success status.
    #[error("Proxy returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from proxy: {0}")]
    Decode(String),

    #[error("Session closed")]
    Cancelled,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
