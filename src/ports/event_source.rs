//! EventSource port - Interface for receiving messages from the event bus.
//!
//! This port defines how the bridge subscribes to bus subjects without
//! knowing about the underlying transport (NATS, in-memory for tests).
//!
//! Delivery is at-most-once: a subscription is a live stream that ends when
//! the bus connection drops, and nothing published while no subscription is
//! open is ever replayed.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// One raw message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Subject (channel) the message was published on.
    pub subject: String,
    /// Undecoded payload bytes.
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

/// Live message stream for a set of subjects.
///
/// The stream terminating means the bus connection was lost.
pub type BusSubscription = BoxStream<'static, BusMessage>;

/// Errors raised while establishing a subscription.
#[derive(Debug, Error)]
pub enum EventSourceError {
    /// The bus could not be reached.
    #[error("Event bus connection failed: {0}")]
    Connect(String),

    /// Connected, but the bus refused the subscription.
    #[error("Subscription to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },
}

/// Port for subscribing to event bus subjects.
///
/// Implementations should:
/// - Open a fresh connection on every call (the bridge calls again after a drop)
/// - Never buffer messages across connections
/// - End the returned stream when the connection is lost
///
/// # Example
///
/// ```ignore
/// let mut messages = source.subscribe(&["signal.new", "market.tick"]).await?;
/// while let Some(message) = messages.next().await {
///     // decode and forward
/// }
/// // connection lost: back off and subscribe again
/// ```
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Subscribe to every subject in `subjects` on a single connection.
    async fn subscribe(&self, subjects: &[&str]) -> Result<BusSubscription, EventSourceError>;

    /// Source name for logging.
    fn name(&self) -> &'static str;
}
