//! Wire types for the dashboard WebSocket stream.
//!
//! The protocol is one-directional for application data: the server pushes
//! `{type, data}` envelopes as text frames and reads nothing but keepalive
//! and close frames from the client.

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use serde::Serialize;

use crate::domain::foundation::{ClientId, Timestamp};
use crate::domain::market::MarketEvent;

/// Encoded envelope shared by every client of one broadcast.
///
/// Cloning is a reference-count bump, so all clients see the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPayload(Arc<str>);

impl BroadcastPayload {
    /// Encodes a market event as its `{type, data}` envelope.
    pub fn encode(event: &MarketEvent) -> Result<Self, serde_json::Error> {
        serde_json::to_string(event).map(Self::from)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text frame carrying this payload.
    pub fn to_message(&self) -> Message {
        Message::Text(self.0.to_string())
    }
}

impl From<String> for BroadcastPayload {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&str> for BroadcastPayload {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for BroadcastPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the hub's registered clients.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    pub connections: Vec<ConnectionInfo>,
}

/// Per-connection entry in [`HubStats`].
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub client_id: ClientId,
    pub connected_at: Timestamp,
    /// Messages waiting in the client's outbound queue.
    pub queued: usize,
}
