//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the hub to external systems:
//! - `events` - Event bus implementations (in-memory, NATS)
//! - `websocket` - Hub, client pumps, bridge and upgrade handler
//! - `http` - Router, health and info endpoints

pub mod events;
pub mod http;
pub mod websocket;

pub use events::{InMemoryEventBus, NatsEventSource};
