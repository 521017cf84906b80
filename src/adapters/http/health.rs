//! Liveness and service info endpoints.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::adapters::websocket::Hub;
use crate::domain::foundation::Timestamp;

pub const SERVICE_NAME: &str = "signal-hub";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
    pub websocket_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub health: &'static str,
    pub websocket: &'static str,
    pub stats: &'static str,
}

/// `GET /health`
///
/// Reports healthy while the process runs; the client count comes from the
/// hub without a round-trip through its loop.
pub async fn health_handler(State(hub): State<Hub>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: Timestamp::now().to_rfc3339(),
        websocket_clients: hub.count(),
    })
}

/// `GET /`
pub async fn info_handler() -> impl IntoResponse {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        description: "Real-time trading signal and market tick stream",
        endpoints: Endpoints {
            health: "/health",
            websocket: "/ws",
            stats: "/ws/stats",
        },
    })
}

pub fn health_router() -> Router<Hub> {
    Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::ClientHandle;
    use crate::config::OverflowPolicy;
    use crate::domain::foundation::ClientId;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> serde_json::Value {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_client_count() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        hub.register(ClientHandle::new(ClientId::new(), tx)).unwrap();
        hub.sync().await.unwrap();

        let json = get_json(health_router().with_state(hub), "/health").await;

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "signal-hub");
        assert_eq!(json["websocket_clients"], 1);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn info_lists_endpoints() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);

        let json = get_json(health_router().with_state(hub), "/").await;

        assert_eq!(json["service"], "signal-hub");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["endpoints"]["websocket"], "/ws");
        assert_eq!(json["endpoints"]["health"], "/health");
    }
}
