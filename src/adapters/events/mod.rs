//! Event bus adapters.
//!
//! Adapters implement the [`EventSource`](crate::ports::EventSource) port
//! for different environments:
//!
//! - `NatsEventSource` - Core NATS subscriptions, used in production
//! - `InMemoryEventBus` - In-process bus with simulated outages for testing

mod in_memory;
mod nats_source;

pub use in_memory::InMemoryEventBus;
pub use nats_source::NatsEventSource;
