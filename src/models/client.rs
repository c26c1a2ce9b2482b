use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::message::Message;
use crate::utils::id::conn_id;

/// Capacity of the per-connection outbound buffer.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Receiving half of a connection's outbound buffer, drained by the write
/// pump.
pub type OutboundRx = mpsc::Receiver<Arc<str>>;

/// One client connection known to the hub. The room set is a local cache of
/// hub-owned membership state, written only by the hub loop.
pub struct Connection {
    pub id: Arc<str>,
    /// Opaque identity supplied at registration; never validated here.
    pub owner_id: String,
    pub connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<Arc<str>>,
    rooms: RwLock<HashSet<String>>,
    metadata: RwLock<HashMap<String, String>>,
    closer: CancellationToken,
    dropped: AtomicU64,
}

impl Connection {
    pub fn new(owner_id: impl Into<String>) -> (Arc<Self>, OutboundRx) {
        Self::with_buffer(owner_id, SEND_BUFFER_SIZE)
    }

    /// Construct with an explicit buffer capacity (tests exercise
    /// backpressure this way).
    pub fn with_buffer(owner_id: impl Into<String>, capacity: usize) -> (Arc<Self>, OutboundRx) {
        let (outbound, rx) = mpsc::channel(capacity);
        let conn = Arc::new(Self {
            id: conn_id(),
            owner_id: owner_id.into(),
            connected_at: Utc::now(),
            outbound,
            rooms: RwLock::new(HashSet::new()),
            metadata: RwLock::new(HashMap::new()),
            closer: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        });
        (conn, rx)
    }

    /// Non-blocking push of an already-serialized frame. Returns false when
    /// the buffer is full or the connection is closed.
    pub fn enqueue(&self, frame: Arc<str>) -> bool {
        !self.closer.is_cancelled() && self.outbound.try_send(frame).is_ok()
    }

    /// Best-effort direct send. A full buffer drops this one message and
    /// leaves the connection open, unlike the broadcast path.
    pub fn send_message(&self, message: &Message) {
        let frame = match serde_json::to_string(message) {
            Ok(json) => Arc::from(json),
            Err(error) => {
                warn!(conn_id = %self.id, %error, "failed to serialize outbound message");
                return;
            }
        };
        if !self.enqueue(frame) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                conn_id = %self.id,
                owner_id = %self.owner_id,
                kind = %message.kind,
                dropped,
                "outbound buffer full, message dropped"
            );
        }
    }

    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Move to the terminal closed state. Idempotent; wakes the pumps.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    pub async fn closed(&self) {
        self.closer.cancelled().await;
    }

    pub async fn is_in_room(&self, room: &str) -> bool {
        self.rooms.read().await.contains(room)
    }

    pub async fn rooms(&self) -> Vec<String> {
        self.rooms.read().await.iter().cloned().collect()
    }

    pub(crate) async fn cache_join(&self, room: String) {
        let _ = self.rooms.write().await.insert(room);
    }

    pub(crate) async fn cache_leave(&self, room: &str) {
        let _ = self.rooms.write().await.remove(room);
    }

    pub(crate) async fn cache_clear(&self) {
        self.rooms.write().await.clear();
    }

    pub async fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self
            .metadata
            .write()
            .await
            .insert(key.into(), value.into());
    }

    pub async fn metadata(&self, key: &str) -> Option<String> {
        self.metadata.read().await.get(key).cloned()
    }

    pub async fn stats(&self) -> ClientStats {
        ClientStats {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            rooms: self.rooms().await,
            metadata: self.metadata.read().await.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// Point-in-time view of one connection, for the admin stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub id: Arc<str>,
    pub owner_id: String,
    pub rooms: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub connected_at: DateTime<Utc>,
}
