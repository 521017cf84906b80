//! Server-side proxy for one connected dashboard.
//!
//! A [`Client`] owns a bounded outbound queue and two pump tasks:
//!
//! - the **outbound pump** drains the queue in FIFO order onto the socket and
//!   sends a keepalive ping whenever the connection has been quiet for one
//!   ping interval;
//! - the **inbound pump** reads the socket only to observe liveness and
//!   closure.
//!
//! Whichever pump exits first unregisters the client from the hub. The hub
//! then drops its end of the queue, which lets the outbound pump send a close
//! frame and finish. Unregistering is idempotent, so both exit paths may
//! call it.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::HubConfig;
use crate::domain::foundation::{ClientId, ConnectionStatus, StateMachine};

use super::hub::{ClientHandle, Hub};
use super::messages::BroadcastPayload;

/// Per-connection tuning, derived from [`HubConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub queue_capacity: usize,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub close_grace: Duration,
}

impl From<&HubConfig> for ClientSettings {
    fn from(config: &HubConfig) -> Self {
        Self {
            queue_capacity: config.client_queue_capacity,
            ping_interval: config.ping_interval(),
            idle_timeout: config.idle_timeout(),
            close_grace: config.close_grace(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&HubConfig::default())
    }
}

/// Why a client connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer sent a close frame or ended the stream.
    ClosedByPeer,
    ReadFailed,
    WriteFailed,
    KeepaliveFailed,
    /// Nothing was read within the idle timeout.
    IdleTimeout,
    /// The peer sent application data on a push-only stream.
    ProtocolViolation,
    /// The hub dropped the client's queue (eviction or shutdown).
    Unregistered,
    /// The hub was shut down before the client could register.
    HubUnavailable,
    /// A pump task panicked or was cancelled.
    TaskFailed,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClosedByPeer => "closed_by_peer",
            Self::ReadFailed => "read_failed",
            Self::WriteFailed => "write_failed",
            Self::KeepaliveFailed => "keepalive_failed",
            Self::IdleTimeout => "idle_timeout",
            Self::ProtocolViolation => "protocol_violation",
            Self::Unregistered => "unregistered",
            Self::HubUnavailable => "hub_unavailable",
            Self::TaskFailed => "task_failed",
        }
    }
}

impl Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connected consumer.
pub struct Client {
    id: ClientId,
    hub: Hub,
    settings: ClientSettings,
    status: ConnectionStatus,
}

impl Client {
    pub fn new(hub: Hub, settings: ClientSettings) -> Self {
        Self {
            id: ClientId::new(),
            hub,
            settings,
            status: ConnectionStatus::Connecting,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Register with the hub and pump the connection until it ends.
    ///
    /// Returns once both pumps have exited and the client is unregistered.
    pub async fn serve<S, R, E>(&mut self, sink: S, stream: R) -> DisconnectReason
    where
        S: Sink<Message> + Send + Unpin + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
    {
        let (queue_tx, queue_rx) = mpsc::channel(self.settings.queue_capacity);

        if self.hub.register(ClientHandle::new(self.id, queue_tx)).is_err() {
            tracing::warn!(client_id = %self.id, "Hub unavailable, refusing client");
            self.advance(ConnectionStatus::Closing);
            self.advance(ConnectionStatus::Closed);
            return DisconnectReason::HubUnavailable;
        }
        self.advance(ConnectionStatus::Active);
        tracing::info!(client_id = %self.id, "Client connected");

        let mut outbound = tokio::spawn(outbound_pump(
            self.id,
            queue_rx,
            sink,
            self.settings.ping_interval,
        ));
        let mut inbound = tokio::spawn(inbound_pump(self.id, stream, self.settings.idle_timeout));

        // The first pump to finish decides the reason.
        let reason = tokio::select! {
            result = &mut outbound => {
                self.hub.unregister(self.id);
                self.advance(ConnectionStatus::Closing);
                // Lets the peer's close reply arrive.
                finish_within(inbound, "inbound", self.settings.close_grace, self.id).await;
                join_reason(result)
            }
            result = &mut inbound => {
                self.hub.unregister(self.id);
                self.advance(ConnectionStatus::Closing);
                finish_within(outbound, "outbound", self.settings.close_grace, self.id).await;
                join_reason(result)
            }
        };

        self.advance(ConnectionStatus::Closed);
        tracing::info!(client_id = %self.id, reason = %reason, "Client disconnected");
        reason
    }

    fn advance(&mut self, next: ConnectionStatus) {
        match self.status.transition_to(next) {
            Ok(status) => self.status = status,
            Err(e) => tracing::warn!(client_id = %self.id, error = %e, "Ignoring status change"),
        }
    }
}

fn join_reason(result: Result<DisconnectReason, tokio::task::JoinError>) -> DisconnectReason {
    result.unwrap_or(DisconnectReason::TaskFailed)
}

async fn finish_within(
    mut task: JoinHandle<DisconnectReason>,
    pump: &'static str,
    grace: Duration,
    client_id: ClientId,
) {
    if tokio::time::timeout(grace, &mut task).await.is_err() {
        tracing::debug!(client_id = %client_id, pump, "Pump did not finish in time, aborting");
        task.abort();
        let _ = task.await;
    }
}

/// Drain `queue` onto `sink` until the queue closes or a write fails.
///
/// A ping is sent after every `ping_interval` without an outbound frame.
/// When the hub drops the queue, a close frame is sent before returning.
pub async fn outbound_pump<S>(
    client_id: ClientId,
    mut queue: mpsc::Receiver<BroadcastPayload>,
    mut sink: S,
    ping_interval: Duration,
) -> DisconnectReason
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut keepalive = interval_at(Instant::now() + ping_interval, ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(payload) => {
                    if let Err(e) = sink.send(payload.to_message()).await {
                        tracing::debug!(client_id = %client_id, error = %e, "Write failed");
                        return DisconnectReason::WriteFailed;
                    }
                    keepalive.reset();
                }
                None => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::trace!(client_id = %client_id, error = %e, "Close frame not sent");
                    }
                    let _ = sink.close().await;
                    return DisconnectReason::Unregistered;
                }
            },
            _ = keepalive.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    tracing::debug!(client_id = %client_id, error = %e, "Keepalive failed");
                    return DisconnectReason::KeepaliveFailed;
                }
            }
        }
    }
}

/// Read `stream` until the peer goes away, misbehaves, or falls silent for
/// longer than `idle_timeout`.
pub async fn inbound_pump<R, E>(client_id: ClientId, mut stream: R, idle_timeout: Duration) -> DisconnectReason
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(frame) => frame,
            Err(_) => {
                tracing::debug!(client_id = %client_id, "Idle timeout");
                return DisconnectReason::IdleTimeout;
            }
        };

        match frame {
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                tracing::trace!(client_id = %client_id, "Keepalive");
            }
            Some(Ok(Message::Text(text))) => {
                tracing::debug!(client_id = %client_id, len = text.len(), "Ignoring inbound text frame");
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!(client_id = %client_id, "Binary frame on push-only stream, closing");
                return DisconnectReason::ProtocolViolation;
            }
            Some(Ok(Message::Close(_))) | None => return DisconnectReason::ClosedByPeer,
            Some(Err(e)) => {
                tracing::debug!(client_id = %client_id, error = %e, "Read failed");
                return DisconnectReason::ReadFailed;
            }
        }
    }
}
