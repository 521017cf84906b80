//! WebSocket adapters for the real-time dashboard stream.
//!
//! This module pushes market events from the event bus to every connected
//! dashboard over WebSocket connections.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Event Bus                                    │
//! │   InMemoryEventBus (test) │ NatsEventSource (production)            │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ subscribes
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        EventBridge                                   │
//! │   - Subscribes to signal.* and market.tick                          │
//! │   - Decodes bus payloads into MarketEvent                           │
//! │   - Reconnects with a fixed backoff                                 │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ broadcasts
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            Hub                                       │
//! │   single loop owns the client set                                    │
//! │   ├── client-a queue ──► outbound pump ──► socket                    │
//! │   ├── client-b queue ──► outbound pump ──► socket                    │
//! │   └── client-c queue ──► outbound pump ──► socket                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire envelope and stats types
//! - [`hub`] - Client registry and fan-out
//! - [`client`] - Per-connection pumps
//! - [`handler`] - Axum WebSocket upgrade handler
//! - [`event_bridge`] - Bridge between event bus and hub

pub mod client;
pub mod event_bridge;
pub mod handler;
pub mod hub;
pub mod messages;

pub use client::{Client, ClientSettings, DisconnectReason};
pub use event_bridge::{BridgeError, EventBridge};
pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use hub::{ClientHandle, Hub, HubError, HubLoop};
pub use messages::{BroadcastPayload, ConnectionInfo, HubStats};
