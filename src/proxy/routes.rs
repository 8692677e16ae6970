//! REST endpoints the browser (or terminal client) calls on its own origin.
//!
//! Every handler validates its input, makes one gateway call, and maps the
//! outcome to a JSON envelope. Backend failures are logged with detail and
//! reported to the caller as a generic 500.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::ApiError;
use crate::gateway::BackendGateway;
use crate::onboarding::Message;

pub const MESSAGE_REQUIRED: &str = "Message is required";
pub const INVALID_BODY: &str = "Invalid request body";
pub const GENERATE_FAILED: &str = "Failed to generate response";
pub const FETCH_STATUS_FAILED: &str = "Failed to fetch status";
pub const PROCESS_FAILED: &str = "Failed to process request";
pub const EXPORT_FAILED: &str = "Failed to export data";

/// Action discriminator accepted by `POST /api/user`.
pub const MARK_DAY_COMPLETE: &str = "mark-day-complete";

/// Shared state for proxy routes.
#[derive(Clone)]
pub struct ProxyState {
    pub gateway: Arc<dyn BackendGateway>,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub memory: Option<Vec<Message>>,
}

/// Successful reply of `POST /api/chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `POST /api/user`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserActionRequest {
    #[serde(default)]
    pub action: Option<String>,
}

/// Recognized user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    MarkDayComplete,
}

impl UserAction {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw {
            Some(MARK_DAY_COMPLETE) => Ok(Self::MarkDayComplete),
            _ => Err(ApiError::UnknownAction),
        }
    }
}

/// Pull the caller's bearer credential from `Authorization`.
///
/// A `Bearer ` prefix is stripped once; a bare token is accepted as is.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// POST /api/chat
///
/// Forwards the new message plus prior history to the backend and returns
/// `{ "response": ... }`.
async fn chat(
    State(state): State<ProxyState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = body.map_err(|e| {
        debug!(error = %e, "Rejected chat body");
        ApiError::Validation(INVALID_BODY.to_string())
    })?;

    let message = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::Validation(MESSAGE_REQUIRED.to_string()))?;
    let memory = req.memory.unwrap_or_default();

    match state.gateway.generate_reply(&message, &memory).await {
        Ok(response) => {
            info!(memory_len = memory.len(), reply_len = response.len(), "Chat reply generated");
            Ok(Json(ChatResponse { response }))
        }
        Err(e) => {
            error!(error = %e, "Error in chat API");
            Err(ApiError::Service(GENERATE_FAILED.to_string()))
        }
    }
}

/// GET /api/user
///
/// Returns the backend's status object unchanged.
async fn get_user(
    State(state): State<ProxyState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_token(&headers);
    state
        .gateway
        .fetch_status(token.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "Error fetching user status");
            ApiError::Service(FETCH_STATUS_FAILED.to_string())
        })
}

/// POST /api/user
///
/// Dispatches on `action`. Only `mark-day-complete` is recognized.
async fn post_user(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Result<Json<UserActionRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body.map_err(|e| {
        debug!(error = %e, "Rejected user action body");
        ApiError::Validation(INVALID_BODY.to_string())
    })?;

    match UserAction::parse(req.action.as_deref())? {
        UserAction::MarkDayComplete => {
            let token = bearer_token(&headers);
            let completion = state
                .gateway
                .mark_day_complete(token.as_deref())
                .await
                .map_err(|e| {
                    error!(error = %e, "Error in user API");
                    ApiError::Service(PROCESS_FAILED.to_string())
                })?;
            info!(
                step = ?completion.pointer("/status/onboarding_step"),
                complete = ?completion.pointer("/status/onboarding_complete"),
                "Onboarding day marked complete"
            );
            Ok(Json(completion))
        }
    }
}

/// GET /api/user/export
async fn export_user(
    State(state): State<ProxyState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_token(&headers);
    state
        .gateway
        .export_data(token.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "Error exporting user data");
            ApiError::Service(EXPORT_FAILED.to_string())
        })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "anton-proxy"
    }))
}

/// Build the proxy REST routes.
pub fn proxy_routes(gateway: Arc<dyn BackendGateway>) -> Router {
    let state = ProxyState { gateway };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/user", get(get_user).post(post_user))
        .route("/api/user/export", get(export_user))
        .with_state(state)
}
