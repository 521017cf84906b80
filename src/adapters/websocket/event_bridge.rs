//! Event bridge connecting bus subjects to WebSocket clients.
//!
//! Subscribes to the market subjects on the event bus and hands each decoded
//! event to the hub as a ready-to-send envelope.
//!
//! # Event Flow
//!
//! ```text
//! Bus message (subject, bytes)
//!          │
//!          ▼
//! ┌────────────────────┐
//! │    EventBridge     │
//! │  decode by subject │──► malformed: log, drop
//! └────────────────────┘
//!          │
//!          ▼
//! ┌────────────────────┐
//! │  Encode {type,data}│
//! └────────────────────┘
//!          │
//!          ▼
//! ┌────────────────────┐
//! │   Hub::broadcast   │
//! └────────────────────┘
//! ```
//!
//! The bus connection is independent of the hub. When the subscription ends
//! or cannot be opened, the bridge logs once at warn level, then retries with
//! a fixed backoff until shutdown. Nothing published during an outage is
//! replayed.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::market::{DecodeError, MarketEvent, Subject};
use crate::ports::{BusMessage, BusSubscription, EventSource};

use super::hub::Hub;
use super::messages::BroadcastPayload;

/// Why a single bus message was not broadcast.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Bridge between the event bus and the broadcast hub.
pub struct EventBridge {
    source: Arc<dyn EventSource>,
    hub: Hub,
    reconnect_backoff: Duration,
}

impl EventBridge {
    pub fn new(source: Arc<dyn EventSource>, hub: Hub, reconnect_backoff: Duration) -> Self {
        Self {
            source,
            hub,
            reconnect_backoff,
        }
    }

    /// Decode one bus message and broadcast its envelope.
    ///
    /// Never blocks: the hub call only enqueues.
    pub fn handle(&self, message: &BusMessage) -> Result<MarketEvent, BridgeError> {
        let event = MarketEvent::decode(&message.subject, &message.payload)?;
        let payload = BroadcastPayload::encode(&event)?;

        tracing::trace!(
            subject = %message.subject,
            symbol = %event.symbol(),
            bytes = payload.len(),
            "Broadcasting event"
        );
        self.hub.broadcast(payload);
        Ok(event)
    }

    /// Consume the bus until `shutdown` flips to `true` or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let subjects = Subject::names();
        let mut failed_attempts: u32 = 0;

        tracing::info!(source = self.source.name(), subjects = ?subjects, "Event bridge started");

        while !*shutdown.borrow() {
            let subscribed = tokio::select! {
                result = self.source.subscribe(&subjects) => result,
                _ = shutdown.changed() => break,
            };

            match subscribed {
                Ok(stream) => {
                    if failed_attempts > 0 {
                        tracing::info!(failed_attempts, "Event bus connection restored");
                    } else {
                        tracing::info!("Subscribed to event bus");
                    }
                    failed_attempts = 0;

                    if self.consume(stream, &mut shutdown).await {
                        break;
                    }
                    tracing::warn!(
                        source = self.source.name(),
                        "Event bus subscription ended, broadcasts paused until reconnect"
                    );
                }
                Err(e) => {
                    failed_attempts += 1;
                    if failed_attempts == 1 {
                        tracing::warn!(error = %e, "Event bus unavailable, retrying");
                    } else {
                        tracing::debug!(error = %e, failed_attempts, "Event bus still unavailable");
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_backoff) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("Event bridge stopped");
    }

    /// Forward messages until the stream ends. Returns `true` on shutdown.
    async fn consume(&self, mut stream: BusSubscription, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => return true,
                next = stream.next() => match next {
                    Some(message) => {
                        if let Err(e) = self.handle(&message) {
                            tracing::warn!(subject = %message.subject, error = %e, "Dropping bus message");
                        }
                    }
                    None => return false,
                },
            }
        }
    }
}
