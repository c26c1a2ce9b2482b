//! The hub: single authority over the connection registry and room index.
//! All mutation funnels through one control loop fed by [`Command`]s; the
//! rest of the crate talks to it through a [`HubHandle`].

pub mod metrics;
pub mod rooms;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::client::{ClientStats, Connection};
use crate::models::message::Message;

use self::metrics::{Metrics, MetricsSnapshot};
use self::rooms::RoomIndex;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10);

// Processed in FIFO order per producer.
enum Command {
    Register(Arc<Connection>),
    Unregister(Arc<str>),
    Join {
        room: String,
        conn: Arc<Connection>,
        done: oneshot::Sender<()>,
    },
    Leave {
        room: String,
        conn: Arc<Connection>,
        done: oneshot::Sender<()>,
    },
    Broadcast(Message),
    Clients(oneshot::Sender<Vec<ClientStats>>),
}

/// The control loop state. Create with [`Hub::new`], drive with
/// [`Hub::run`]; interact through the returned [`HubHandle`].
pub struct Hub {
    commands: mpsc::UnboundedReceiver<Command>,
    // Lets the broadcast path re-enqueue evictions instead of unregistering
    // inline.
    feedback: mpsc::UnboundedSender<Command>,
    registry: HashMap<Arc<str>, Arc<Connection>>,
    rooms: RoomIndex,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

/// Cloneable front door to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(Metrics::new());
        let shutdown = CancellationToken::new();
        let hub = Self {
            commands: rx,
            feedback: tx.clone(),
            registry: HashMap::new(),
            rooms: RoomIndex::default(),
            metrics: metrics.clone(),
            shutdown: shutdown.clone(),
        };
        let handle = HubHandle {
            commands: tx,
            metrics,
            shutdown,
        };
        (hub, handle)
    }

    /// Run the control loop until the shutdown token fires (or every handle
    /// is dropped), then close all connections and clear the maps. A hub is
    /// not reusable afterwards; commands sent after shutdown are dropped.
    pub async fn run(mut self) {
        let mut tick = time::interval_at(
            Instant::now() + MAINTENANCE_INTERVAL,
            MAINTENANCE_INTERVAL,
        );
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = tick.tick() => self.log_metrics().await,
            }
        }
        self.shutdown_all().await;
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register(conn) => self.register(conn),
            Command::Unregister(id) => self.unregister(&id).await,
            Command::Join { room, conn, done } => {
                self.join(&room, &conn).await;
                let _ = done.send(());
            }
            Command::Leave { room, conn, done } => {
                self.leave(&room, &conn).await;
                let _ = done.send(());
            }
            Command::Broadcast(message) => self.broadcast(message).await,
            Command::Clients(reply) => {
                let _ = reply.send(self.client_stats().await);
            }
        }
    }

    fn register(&mut self, conn: Arc<Connection>) {
        self.metrics.record_connect();
        info!(
            conn_id = %conn.id,
            owner_id = %conn.owner_id,
            total = self.registry.len() + 1,
            "connection registered"
        );
        let _ = self.registry.insert(conn.id.clone(), conn);
    }

    // Idempotent: unknown ids are a no-op.
    async fn unregister(&mut self, id: &str) {
        let Some(conn) = self.registry.remove(id) else {
            return;
        };
        for room in conn.rooms().await {
            if self.rooms.remove(&room, id) {
                self.metrics.set_room_size(&room, self.rooms.size(&room)).await;
            }
        }
        conn.cache_clear().await;
        conn.close();
        self.metrics.record_disconnect();
        info!(
            conn_id = %conn.id,
            owner_id = %conn.owner_id,
            total = self.registry.len(),
            "connection unregistered"
        );
    }

    async fn join(&mut self, room: &str, conn: &Arc<Connection>) {
        // A connection evicted concurrently with a join request must not
        // re-enter the index through a stale command.
        if !self.registry.contains_key(conn.id.as_ref()) {
            debug!(conn_id = %conn.id, room, "join ignored, connection not registered");
            return;
        }
        if self.rooms.add(room, conn) {
            conn.cache_join(room.to_owned()).await;
            let members = self.rooms.size(room);
            self.metrics.set_room_size(room, members).await;
            info!(conn_id = %conn.id, owner_id = %conn.owner_id, room, members, "joined room");
        }
    }

    async fn leave(&mut self, room: &str, conn: &Arc<Connection>) {
        if self.rooms.remove(room, &conn.id) {
            conn.cache_leave(room).await;
            self.metrics.set_room_size(room, self.rooms.size(room)).await;
            info!(conn_id = %conn.id, owner_id = %conn.owner_id, room, "left room");
        }
    }

    // The target set is resolved now, not at enqueue time; a racing join may
    // miss the message.
    async fn broadcast(&mut self, message: Message) {
        let frame: Arc<str> = match serde_json::to_string(&message) {
            Ok(json) => Arc::from(json),
            Err(error) => {
                warn!(kind = %message.kind, %error, "failed to serialize broadcast");
                return;
            }
        };
        let targets = match message.room.as_deref() {
            Some(room) => self.rooms.members(room),
            None => self.registry.values().cloned().collect(),
        };
        let mut delivered = 0u64;
        for conn in &targets {
            if conn.enqueue(frame.clone()) {
                delivered += 1;
            } else {
                warn!(
                    conn_id = %conn.id,
                    owner_id = %conn.owner_id,
                    "outbound buffer full, evicting slow connection"
                );
                let _ = self.feedback.send(Command::Unregister(conn.id.clone()));
            }
        }
        self.metrics.record_sent(delivered);
        self.metrics.mark_broadcast(message.timestamp).await;
        debug!(
            kind = %message.kind,
            room = message.room.as_deref().unwrap_or("all"),
            targets = targets.len(),
            delivered,
            "broadcast"
        );
    }

    async fn client_stats(&self) -> Vec<ClientStats> {
        let mut stats = Vec::with_capacity(self.registry.len());
        for conn in self.registry.values() {
            stats.push(conn.stats().await);
        }
        stats
    }

    async fn log_metrics(&self) {
        let snapshot = self.metrics.snapshot().await;
        info!(
            active = snapshot.active_connections,
            total = snapshot.total_connections,
            sent = snapshot.messages_sent,
            received = snapshot.messages_received,
            rooms = self.rooms.room_count(),
            "hub metrics"
        );
    }

    async fn shutdown_all(&mut self) {
        info!(connections = self.registry.len(), "hub shutting down");
        for (_, conn) in self.registry.drain() {
            conn.cache_clear().await;
            conn.close();
            self.metrics.record_disconnect();
        }
        self.rooms.clear();
        self.metrics.clear_rooms().await;
        info!("hub shutdown complete");
    }
}

impl HubHandle {
    /// Hand a connection to the hub. Fire and forget; the connection shows
    /// up as a fan-out target once the loop has processed the command.
    pub fn register(&self, conn: Arc<Connection>) {
        self.send(Command::Register(conn));
    }

    /// Idempotent removal; safe to call from any exit path.
    pub fn unregister(&self, id: Arc<str>) {
        self.send(Command::Unregister(id));
    }

    /// Add the connection to a room. Returns once the hub has processed the
    /// request, so the connection's membership cache is up to date.
    pub async fn join_room(&self, room: impl Into<String>, conn: &Arc<Connection>) {
        let (done, ack) = oneshot::channel();
        self.send(Command::Join {
            room: room.into(),
            conn: conn.clone(),
            done,
        });
        let _ = ack.await;
    }

    /// Remove the connection from a room; see [`HubHandle::join_room`].
    pub async fn leave_room(&self, room: impl Into<String>, conn: &Arc<Connection>) {
        let (done, ack) = oneshot::channel();
        self.send(Command::Leave {
            room: room.into(),
            conn: conn.clone(),
            done,
        });
        let _ = ack.await;
    }

    /// Fan a message out to every member of a room.
    pub fn broadcast_to_room(
        &self,
        room: impl Into<String>,
        kind: impl Into<String>,
        data: Map<String, Value>,
    ) {
        self.send(Command::Broadcast(Message::for_room(kind, room, data)));
    }

    /// Fan a message out to every registered connection.
    pub fn broadcast_to_all(&self, kind: impl Into<String>, data: Map<String, Value>) {
        self.send(Command::Broadcast(Message::new(kind, data)));
    }

    /// Per-connection detail. Empty once the hub has shut down.
    pub async fn clients(&self) -> Vec<ClientStats> {
        let (reply, stats) = oneshot::channel();
        self.send(Command::Clients(reply));
        stats.await.unwrap_or_default()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot().await
    }

    /// Signal the loop to perform an orderly shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            debug!("hub stopped, command dropped");
        }
    }
}
