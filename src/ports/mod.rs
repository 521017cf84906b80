//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the hub and the outside world. Adapters implement these ports.
//!
//! ## Event Ports
//!
//! - `EventSource` - Port for subscribing to event bus subjects
//! - `BusMessage` - Raw message delivered by a subscription

mod event_source;

pub use event_source::{BusMessage, BusSubscription, EventSource, EventSourceError};
