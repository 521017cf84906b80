//! Broadcast hub: the single owner of the connected-client set.
//!
//! Every mutation and iteration of the client set happens inside
//! [`HubLoop::run`]. Callers hold a cloneable [`Hub`] handle whose operations
//! are non-blocking channel sends, so no lock guards the set.
//!
//! # Architecture
//!
//! ```text
//!  shutdown ───────┐
//!  register ───────┤            ┌──► client-a queue ──► pump ──► socket
//!  unregister ─────┼──► HubLoop ┼──► client-b queue ──► pump ──► socket
//!  broadcast ──────┤   (biased) └──► client-c queue ──► pump ──► socket
//!  sync / stats ───┘
//! ```
//!
//! Broadcasts, `sync` and `stats` share one FIFO channel, so a barrier or
//! snapshot waits only for broadcasts queued before it and cannot be starved
//! by a tick storm queued after it.
//!
//! Fan-out uses `try_send`. A client whose queue is full is evicted in the
//! same iteration (or skipped, under [`OverflowPolicy::DropMessage`]) so one
//! stalled consumer never delays the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::OverflowPolicy;
use crate::domain::foundation::{ClientId, Timestamp};

use super::messages::{BroadcastPayload, ConnectionInfo, HubStats};

/// Errors returned by hub operations that need the coordination loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Hub is shut down")]
    Closed,
}

/// The hub's view of one registered client: its identity and the sending
/// half of its outbound queue.
///
/// Dropping the handle closes the queue, which tells the client's outbound
/// pump to flush and stop.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    outbound: mpsc::Sender<BroadcastPayload>,
    connected_at: Timestamp,
}

impl ClientHandle {
    pub fn new(id: ClientId, outbound: mpsc::Sender<BroadcastPayload>) -> Self {
        Self {
            id,
            outbound,
            connected_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    fn queued(&self) -> usize {
        self.outbound.max_capacity() - self.outbound.capacity()
    }
}

/// Requests served strictly in the order they were queued.
enum Command {
    Broadcast(BroadcastPayload),
    Sync(oneshot::Sender<()>),
    Stats(oneshot::Sender<HubStats>),
}

/// Cloneable handle to the hub's coordination loop.
#[derive(Clone)]
pub struct Hub {
    shutdown_tx: mpsc::UnboundedSender<()>,
    register_tx: mpsc::UnboundedSender<ClientHandle>,
    unregister_tx: mpsc::UnboundedSender<ClientId>,
    command_tx: mpsc::UnboundedSender<Command>,
    client_count: Arc<AtomicUsize>,
}

impl Hub {
    /// Create a hub handle and the loop that must be driven for it to work.
    pub fn new(overflow_policy: OverflowPolicy) -> (Self, HubLoop) {
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let client_count = Arc::new(AtomicUsize::new(0));

        let hub = Self {
            shutdown_tx,
            register_tx,
            unregister_tx,
            command_tx,
            client_count: client_count.clone(),
        };
        let hub_loop = HubLoop {
            clients: HashMap::new(),
            shutdown_rx,
            register_rx,
            unregister_rx,
            command_rx,
            client_count,
            overflow_policy,
        };
        (hub, hub_loop)
    }

    /// Create a hub and spawn its loop on the current runtime.
    pub fn spawn(overflow_policy: OverflowPolicy) -> (Self, JoinHandle<()>) {
        let (hub, hub_loop) = Self::new(overflow_policy);
        let task = tokio::spawn(hub_loop.run());
        (hub, task)
    }

    /// Queue a newly constructed client for registration.
    ///
    /// Each client must be registered exactly once.
    pub fn register(&self, client: ClientHandle) -> Result<(), HubError> {
        self.register_tx.send(client).map_err(|_| HubError::Closed)
    }

    /// Queue removal of a client. Unknown or already-removed ids are a no-op.
    pub fn unregister(&self, client_id: ClientId) {
        // A closed hub has already dropped every client.
        let _ = self.unregister_tx.send(client_id);
    }

    /// Queue `payload` for delivery to every registered client.
    pub fn broadcast(&self, payload: BroadcastPayload) {
        if self.command_tx.send(Command::Broadcast(payload)).is_err() {
            tracing::trace!("Hub is shut down, dropping broadcast");
        }
    }

    /// Number of registered clients as of the last completed register or
    /// unregister.
    pub fn count(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    /// Resolves once the loop has processed every request queued before
    /// this call.
    pub async fn sync(&self) -> Result<(), HubError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Sync(ack_tx))
            .map_err(|_| HubError::Closed)?;
        ack_rx.await.map_err(|_| HubError::Closed)
    }

    /// Snapshot of registered clients, taken inside the loop after every
    /// request queued before this call.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Stats(reply_tx))
            .map_err(|_| HubError::Closed)?;
        reply_rx.await.map_err(|_| HubError::Closed)
    }

    /// Ask the loop to drop every client and exit. Idempotent.
    ///
    /// Takes effect ahead of any queued work.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// True once the loop has exited.
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

/// The coordination loop. Sole owner of the client set.
pub struct HubLoop {
    clients: HashMap<ClientId, ClientHandle>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    register_rx: mpsc::UnboundedReceiver<ClientHandle>,
    unregister_rx: mpsc::UnboundedReceiver<ClientId>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    client_count: Arc<AtomicUsize>,
    overflow_policy: OverflowPolicy,
}

impl HubLoop {
    /// Run until [`Hub::shutdown`] is called or every handle is dropped.
    ///
    /// Requests are taken in priority order shutdown, register, unregister,
    /// then the command queue. Membership changes made before a `sync` or
    /// `stats` call are therefore applied before it is answered.
    pub async fn run(mut self) {
        tracing::info!(overflow_policy = ?self.overflow_policy, "Hub started");

        loop {
            tokio::select! {
                biased;

                // `None` means every handle is gone.
                _ = self.shutdown_rx.recv() => break,
                Some(client) = self.register_rx.recv() => self.add(client),
                Some(client_id) = self.unregister_rx.recv() => self.remove(client_id, "unregistered"),
                command = self.command_rx.recv() => match command {
                    Some(Command::Broadcast(payload)) => self.fan_out(payload),
                    Some(Command::Sync(ack)) => {
                        let _ = ack.send(());
                    }
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    None => break,
                },
            }
        }

        let remaining = self.clients.len();
        self.clients.clear();
        self.publish_count();
        tracing::info!(dropped_clients = remaining, "Hub stopped");
    }

    fn add(&mut self, client: ClientHandle) {
        let client_id = client.id;
        if self.clients.contains_key(&client_id) {
            tracing::warn!(client_id = %client_id, "Client registered twice, keeping first registration");
            return;
        }

        self.clients.insert(client_id, client);
        self.publish_count();
        tracing::debug!(client_id = %client_id, clients = self.clients.len(), "Client registered");
    }

    fn remove(&mut self, client_id: ClientId, reason: &'static str) {
        if self.clients.remove(&client_id).is_some() {
            self.publish_count();
            tracing::debug!(
                client_id = %client_id,
                reason,
                clients = self.clients.len(),
                "Client removed"
            );
        }
    }

    fn fan_out(&mut self, payload: BroadcastPayload) {
        let mut evicted = Vec::new();

        for (client_id, client) in &self.clients {
            match client.outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => match self.overflow_policy {
                    OverflowPolicy::Evict => evicted.push((*client_id, "outbound queue full")),
                    OverflowPolicy::DropMessage => {
                        tracing::debug!(client_id = %client_id, "Outbound queue full, message dropped");
                    }
                },
                Err(TrySendError::Closed(_)) => evicted.push((*client_id, "outbound queue closed")),
            }
        }

        for (client_id, reason) in evicted {
            tracing::warn!(client_id = %client_id, reason, "Evicting client");
            self.remove(client_id, reason);
        }
    }

    fn snapshot(&self) -> HubStats {
        HubStats {
            total_connections: self.clients.len(),
            connections: self
                .clients
                .values()
                .map(|c| ConnectionInfo {
                    client_id: c.id,
                    connected_at: c.connected_at,
                    queued: c.queued(),
                })
                .collect(),
        }
    }

    fn publish_count(&self) {
        self.client_count.store(self.clients.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(capacity: usize) -> (ClientHandle, mpsc::Receiver<BroadcastPayload>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientHandle::new(ClientId::new(), tx), rx)
    }

    fn payload(n: usize) -> BroadcastPayload {
        BroadcastPayload::from(format!(r#"{{"type":"market_tick","data":{{"seq":{}}}}}"#, n))
    }

    #[tokio::test]
    async fn register_makes_client_visible_to_count() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let (handle, _rx) = client(4);

        hub.register(handle).unwrap();
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 1);
    }

    #[tokio::test]
    async fn unregister_removes_client_and_closes_queue() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let (handle, mut rx) = client(4);
        let id = handle.id();

        hub.register(handle).unwrap();
        hub.unregister(id);
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unregister_twice_is_harmless() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let (handle, _rx) = client(4);
        let id = handle.id();

        hub.register(handle).unwrap();
        hub.unregister(id);
        hub.unregister(id);
        hub.unregister(ClientId::new());
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_first_queue() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let id = ClientId::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);

        hub.register(ClientHandle::new(id, tx1)).unwrap();
        hub.register(ClientHandle::new(id, tx2)).unwrap();
        hub.broadcast(payload(1));
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 1);
        assert_eq!(rx1.recv().await, Some(payload(1)));
        assert!(rx2.recv().await.is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (handle, rx) = client(4);
            hub.register(handle).unwrap();
            receivers.push(rx);
        }

        hub.broadcast(payload(7));
        hub.sync().await.unwrap();

        for rx in &mut receivers {
            assert_eq!(rx.recv().await, Some(payload(7)));
        }
    }

    #[tokio::test]
    async fn full_queue_evicts_only_that_client() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let (slow, _slow_rx) = client(1);
        let slow_id = slow.id();
        let (fast, mut fast_rx) = client(8);

        hub.register(slow).unwrap();
        hub.register(fast).unwrap();
        hub.broadcast(payload(1));
        hub.broadcast(payload(2));
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 1);
        let stats = hub.stats().await.unwrap();
        assert!(stats.connections.iter().all(|c| c.client_id != slow_id));
        assert_eq!(fast_rx.recv().await, Some(payload(1)));
        assert_eq!(fast_rx.recv().await, Some(payload(2)));
    }

    #[tokio::test]
    async fn drop_message_policy_keeps_saturated_client() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::DropMessage);
        let (slow, mut slow_rx) = client(1);

        hub.register(slow).unwrap();
        hub.broadcast(payload(1));
        hub.broadcast(payload(2));
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 1);
        assert_eq!(slow_rx.recv().await, Some(payload(1)));
        assert!(slow_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_removed_on_next_broadcast() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::DropMessage);
        let (handle, rx) = client(4);

        hub.register(handle).unwrap();
        drop(rx);
        hub.broadcast(payload(1));
        hub.sync().await.unwrap();

        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn stats_report_queue_depth() {
        let (hub, _task) = Hub::spawn(OverflowPolicy::Evict);
        let (handle, _rx) = client(8);
        let id = handle.id();

        hub.register(handle).unwrap();
        hub.broadcast(payload(1));
        hub.broadcast(payload(2));

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.connections[0].client_id, id);
        assert_eq!(stats.connections[0].queued, 2);
    }

    #[tokio::test]
    async fn shutdown_drops_clients_and_rejects_new_work() {
        let (hub, task) = Hub::spawn(OverflowPolicy::Evict);
        let (handle, mut rx) = client(4);

        hub.register(handle).unwrap();
        hub.sync().await.unwrap();
        hub.shutdown();
        task.await.unwrap();

        assert!(hub.is_closed());
        assert_eq!(hub.count(), 0);
        assert!(rx.recv().await.is_none());
        assert_eq!(hub.sync().await, Err(HubError::Closed));
        let (late, _late_rx) = client(4);
        assert_eq!(hub.register(late).unwrap_err(), HubError::Closed);
        hub.broadcast(payload(1));
        hub.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn control_requests_are_served_during_broadcast_storm() {
        use std::sync::atomic::AtomicBool;
        use std::time::Duration;

        let (hub, task) = Hub::spawn(OverflowPolicy::DropMessage);
        let (handle, _rx) = client(1);
        hub.register(handle).unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let storm = {
            let hub = hub.clone();
            let running = running.clone();
            tokio::spawn(async move {
                let mut seq = 0;
                while running.load(Ordering::Relaxed) {
                    for _ in 0..256 {
                        hub.broadcast(payload(seq));
                        seq += 1;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..10 {
            let stats = tokio::time::timeout(Duration::from_secs(2), hub.stats())
                .await
                .expect("stats should not starve behind broadcasts")
                .unwrap();
            assert_eq!(stats.total_connections, 1);
            tokio::time::timeout(Duration::from_secs(2), hub.sync())
                .await
                .expect("sync should not starve behind broadcasts")
                .unwrap();
        }

        hub.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("shutdown should preempt queued broadcasts")
            .unwrap();

        running.store(false, Ordering::Relaxed);
        storm.await.unwrap();
    }

    #[tokio::test]
    async fn loop_exits_when_all_handles_dropped() {
        let (hub, task) = Hub::spawn(OverflowPolicy::Evict);
        drop(hub);

        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("hub loop should exit")
            .unwrap();
    }
}
