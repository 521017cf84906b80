//! In-memory event bus implementation for testing.
//!
//! Mimics fire-and-forget pub/sub semantics: messages go only to the
//! subscriptions open at publish time, and [`InMemoryEventBus::disconnect`]
//! ends every open subscription the way a dropped broker connection would.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.
//! Production code should use [`super::NatsEventSource`].

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ports::{BusMessage, BusSubscription, EventSource, EventSourceError};

struct Subscription {
    subjects: HashSet<String>,
    tx: mpsc::UnboundedSender<BusMessage>,
}

/// In-memory event bus for testing.
///
/// Features:
/// - At-most-once delivery to currently open subscriptions
/// - Simulated outages (`disconnect` / `reconnect`)
/// - Counters for assertions
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// let mut stream = bus.subscribe(&["market.tick"]).await?;
///
/// bus.publish("market.tick", br#"{"symbol":"TCS"}"#);
/// bus.disconnect(); // stream ends, publishes are lost until reconnect()
/// ```
pub struct InMemoryEventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    online: AtomicBool,
    subscribe_attempts: AtomicUsize,
}

impl InMemoryEventBus {
    /// Creates a new, online event bus with no subscriptions.
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            subscribe_attempts: AtomicUsize::new(0),
        }
    }

    /// Publishes a message to every open subscription for `subject`.
    ///
    /// Returns the number of subscriptions the message reached. Messages
    /// published while offline or with no subscribers are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn publish(&self, subject: &str, payload: impl AsRef<[u8]>) -> usize {
        if !self.is_online() {
            return 0;
        }

        let mut subscriptions = self
            .subscriptions
            .lock()
            .expect("InMemoryEventBus: subscriptions lock poisoned");
        subscriptions.retain(|s| !s.tx.is_closed());

        let mut delivered = 0;
        for subscription in subscriptions.iter() {
            if subscription.subjects.contains(subject) {
                let message = BusMessage::new(subject, payload.as_ref().to_vec());
                if subscription.tx.unbounded_send(message).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Simulates a broker outage: ends all open subscriptions and refuses
    /// new ones until [`reconnect`](Self::reconnect) is called.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn disconnect(&self) {
        self.online.store(false, Ordering::SeqCst);
        self.subscriptions
            .lock()
            .expect("InMemoryEventBus: subscriptions lock poisoned")
            .clear();
    }

    /// Brings the bus back online.
    pub fn reconnect(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of subscriptions whose stream is still being consumed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .expect("InMemoryEventBus: subscriptions lock poisoned")
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }

    /// Total calls to `subscribe`, successful or not.
    pub fn subscribe_attempts(&self) -> usize {
        self.subscribe_attempts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for InMemoryEventBus {
    async fn subscribe(&self, subjects: &[&str]) -> Result<BusSubscription, EventSourceError> {
        self.subscribe_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.is_online() {
            return Err(EventSourceError::Connect("in-memory bus is offline".to_string()));
        }

        let (tx, rx) = mpsc::unbounded();
        self.subscriptions
            .lock()
            .expect("InMemoryEventBus: subscriptions lock poisoned")
            .push(Subscription {
                subjects: subjects.iter().map(|s| s.to_string()).collect(),
                tx,
            });

        Ok(rx.boxed())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_matching_subjects_only() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.subscribe(&["market.tick"]).await.unwrap();

        assert_eq!(bus.publish("signal.new", b"{}"), 0);
        assert_eq!(bus.publish("market.tick", b"tick"), 1);

        let message = stream.next().await.unwrap();
        assert_eq!(message.subject, "market.tick");
        assert_eq!(message.payload, b"tick");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_lost() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish("market.tick", b"lost"), 0);

        let mut stream = bus.subscribe(&["market.tick"]).await.unwrap();
        bus.publish("market.tick", b"kept");

        assert_eq!(stream.next().await.unwrap().payload, b"kept");
    }

    #[tokio::test]
    async fn disconnect_ends_open_streams() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.subscribe(&["signal.new"]).await.unwrap();

        bus.disconnect();

        assert!(stream.next().await.is_none());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_fails_while_offline() {
        let bus = InMemoryEventBus::new();
        bus.disconnect();

        let result = bus.subscribe(&["signal.new"]).await;
        assert!(matches!(result, Err(EventSourceError::Connect(_))));

        bus.reconnect();
        assert!(bus.subscribe(&["signal.new"]).await.is_ok());
        assert_eq!(bus.subscribe_attempts(), 2);
    }

    #[tokio::test]
    async fn dropped_stream_is_pruned_on_publish() {
        let bus = InMemoryEventBus::new();
        let stream = bus.subscribe(&["market.tick"]).await.unwrap();
        drop(stream);

        assert_eq!(bus.publish("market.tick", b"{}"), 0);
        assert_eq!(bus.subscription_count(), 0);
    }
}
