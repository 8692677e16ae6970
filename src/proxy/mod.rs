//! Same-origin proxy server in front of the backend.

pub mod routes;

pub use routes::{ChatRequest, ChatResponse, ProxyState, UserAction, proxy_routes};

use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ProxyConfig;
use crate::gateway::BackendGateway;

/// Build the full proxy application: routes, request tracing, and CORS when
/// cross-origin callers are configured.
pub fn build_app(gateway: Arc<dyn BackendGateway>, config: &ProxyConfig) -> Router {
    let app = proxy_routes(gateway).layer(TraceLayer::new_for_http());

    match cors_layer(&config.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_credentials(true),
    )
}
