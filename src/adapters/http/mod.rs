//! HTTP adapters - the service's outward surface.
//!
//! Combines the health/info routes with the WebSocket routes and applies
//! request tracing and CORS.

pub mod health;

pub use health::{health_router, HealthResponse, ServiceInfo, SERVICE_NAME};

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, WebSocketState};
use crate::config::ServerConfig;

/// Build the complete application router.
pub fn router(ws_state: WebSocketState, server: &ServerConfig) -> Router {
    let hub = ws_state.hub.clone();

    Router::new()
        .merge(health_router().with_state(hub))
        .merge(websocket_router().with_state(ws_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins_list()))
}

/// Permissive when no origins are configured, otherwise limited to them.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
