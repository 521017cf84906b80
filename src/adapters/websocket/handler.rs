//! WebSocket upgrade handler for the dashboard stream.
//!
//! Handles the HTTP → WebSocket upgrade and hands the socket to a [`Client`]:
//! 1. Refuse the upgrade if the hub is shut down
//! 2. Upgrade to WebSocket
//! 3. Register with the hub
//! 4. Pump broadcasts out and keepalives in until disconnect
//! 5. Unregister
//!
//! Every upgraded connection is tracked so shutdown can wait for clients to
//! receive their queued messages and a close frame.

use std::time::Duration;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use tokio_util::task::TaskTracker;

use super::client::{Client, ClientSettings};
use super::hub::Hub;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    /// Hub every new connection registers with.
    pub hub: Hub,
    pub settings: ClientSettings,
    connections: TaskTracker,
}

impl WebSocketState {
    pub fn new(hub: Hub, settings: ClientSettings) -> Self {
        Self {
            hub,
            settings,
            connections: TaskTracker::new(),
        }
    }

    /// Number of upgraded connections still being served.
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Wait up to `grace` for every upgraded connection to finish.
    ///
    /// Call after [`Hub::shutdown`] so that each client flushes its queue and
    /// sends a close frame. Returns `false` if connections were still open
    /// when `grace` elapsed.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.connections.close();
        let drained = tokio::time::timeout(grace, self.connections.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.connections.len(),
                "WebSocket connections still open after grace period"
            );
        }
        drained
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
///
/// Access control is left to the reverse proxy in front of the service.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
    if state.hub.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Shutting down").into_response();
    }

    // Held from before the upgrade so a connection mid-handshake counts too.
    let tracked = state.connections.token();
    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, state).await;
        drop(tracked);
    })
}

/// Handle an established WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: WebSocketState) {
    let (sender, receiver) = socket.split();
    let mut client = Client::new(state.hub, state.settings);

    client.serve(sender, receiver).await;
}

/// Snapshot of connected clients.
///
/// Route: `GET /ws/stats`
pub async fn stats_handler(State(state): State<WebSocketState>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// Create axum router for the WebSocket endpoints.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(websocket_router())
///     .with_state(ws_state);
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(stats_handler))
}
