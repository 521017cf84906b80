//! NATS core event source for production deployments.
//!
//! Each call to [`EventSource::subscribe`] opens a dedicated NATS connection
//! and subscribes to every requested subject on it. Core NATS is
//! fire-and-forget, so messages published while the connection is down are
//! gone. The client library would reconnect on its own, but the returned
//! stream ends at the first disconnect so the bridge owns the retry loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;

use crate::config::EventBusConfig;
use crate::ports::{BusMessage, BusSubscription, EventSource, EventSourceError};

/// Connection name reported to the NATS server.
const CONNECTION_NAME: &str = "signal-hub";

/// NATS-backed [`EventSource`].
#[derive(Debug, Clone)]
pub struct NatsEventSource {
    url: String,
    connect_timeout: Duration,
}

impl NatsEventSource {
    /// Create a source for the given `nats://` or `tls://` URL.
    ///
    /// Only parses the URL; no connection is made until `subscribe`.
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, EventSourceError> {
        url.parse::<async_nats::ServerAddr>()
            .map_err(|e| EventSourceError::Connect(format!("invalid NATS URL {}: {}", url, e)))?;
        Ok(Self {
            url: url.to_string(),
            connect_timeout,
        })
    }

    /// Create a source from the event bus configuration section.
    pub fn from_config(config: &EventBusConfig) -> Result<Self, EventSourceError> {
        Self::new(&config.url, config.connect_timeout())
    }
}

#[async_trait]
impl EventSource for NatsEventSource {
    async fn subscribe(&self, subjects: &[&str]) -> Result<BusSubscription, EventSourceError> {
        let (disconnected_tx, mut disconnected_rx) = watch::channel(false);
        let disconnected_tx = Arc::new(disconnected_tx);

        let client = async_nats::ConnectOptions::new()
            .name(CONNECTION_NAME)
            .connection_timeout(self.connect_timeout)
            .event_callback(move |event| {
                let disconnected_tx = disconnected_tx.clone();
                async move {
                    tracing::debug!(event = ?event, "NATS connection event");
                    if matches!(event, async_nats::Event::Disconnected) {
                        let _ = disconnected_tx.send(true);
                    }
                }
            })
            .connect(self.url.as_str())
            .await
            .map_err(|e| EventSourceError::Connect(e.to_string()))?;

        let mut subscribers = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let subscriber = client.subscribe(subject.to_string()).await.map_err(|e| {
                EventSourceError::Subscribe {
                    subject: subject.to_string(),
                    reason: e.to_string(),
                }
            })?;
            subscribers.push(subscriber);
        }

        let messages = futures::stream::select_all(subscribers)
            .map(move |msg| {
                // Dropping the last client handle closes the connection.
                let _connection = &client;
                BusMessage::new(msg.subject.to_string(), msg.payload.to_vec())
            })
            .take_until(async move {
                let _ = disconnected_rx.wait_for(|disconnected| *disconnected).await;
            });

        Ok(messages.boxed())
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_nats_url() {
        let source = NatsEventSource::new("nats://localhost:4222", Duration::from_secs(1));
        assert!(source.is_ok());
    }

    #[test]
    fn new_rejects_malformed_url() {
        let source = NatsEventSource::new("nats://localhost:notaport", Duration::from_secs(1));
        assert!(matches!(source, Err(EventSourceError::Connect(_))));
    }

    #[test]
    fn from_config_uses_default_url() {
        let source = NatsEventSource::from_config(&EventBusConfig::default()).unwrap();
        assert_eq!(source.url, "nats://localhost:4222");
        assert_eq!(source.connect_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn subscribe_to_unreachable_server_fails_with_connect_error() {
        // Port 1 is reserved and never runs NATS.
        let source = NatsEventSource::new("nats://127.0.0.1:1", Duration::from_millis(500)).unwrap();

        let result = source.subscribe(&["signal.new"]).await;
        assert!(matches!(result, Err(EventSourceError::Connect(_))));
    }

    #[test]
    fn name_is_nats() {
        let source = NatsEventSource::new("nats://localhost:4222", Duration::from_secs(1)).unwrap();
        assert_eq!(source.name(), "nats");
    }
}
