use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Aggregate hub counters. Atomics so the read pumps can bump the inbound
/// count without going through the control loop; readers only ever see an
/// independent [`MetricsSnapshot`].
#[derive(Default)]
pub struct Metrics {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    last_broadcast: RwLock<Option<DateTime<Utc>>>,
    room_sizes: RwLock<HashMap<String, usize>>,
}

/// Deep copy of the counters at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub last_broadcast: Option<DateTime<Utc>>,
    pub rooms: HashMap<String, usize>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect(&self) {
        let _ = self.total_connections.fetch_add(1, Ordering::Relaxed);
        let _ = self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnect(&self) {
        // Saturating: a stray double decrement must not wrap.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |active| {
                Some(active.saturating_sub(1))
            });
    }

    pub(crate) fn record_sent(&self, delivered: u64) {
        let _ = self.messages_sent.fetch_add(delivered, Ordering::Relaxed);
    }

    /// Called from connection read pumps on every decoded inbound message.
    pub fn record_received(&self) {
        let _ = self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) async fn mark_broadcast(&self, at: DateTime<Utc>) {
        *self.last_broadcast.write().await = Some(at);
    }

    /// Mirror a room's occupancy; zero removes the entry.
    pub(crate) async fn set_room_size(&self, room: &str, size: usize) {
        let mut rooms = self.room_sizes.write().await;
        if size == 0 {
            let _ = rooms.remove(room);
        } else {
            let _ = rooms.insert(room.to_owned(), size);
        }
    }

    pub(crate) async fn clear_rooms(&self) {
        self.room_sizes.write().await.clear();
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            last_broadcast: *self.last_broadcast.read().await,
            rooms: self.room_sizes.read().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_and_disconnect_track_active_and_total() {
        let metrics = Metrics::new();
        metrics.record_connect();
        metrics.record_connect();
        metrics.record_disconnect();
        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
    }

    #[tokio::test]
    async fn disconnect_saturates_at_zero() {
        let metrics = Metrics::new();
        metrics.record_disconnect();
        assert_eq!(metrics.active_connections(), 0);
    }

    #[tokio::test]
    async fn room_size_zero_removes_entry() {
        let metrics = Metrics::new();
        metrics.set_room_size("s1", 2).await;
        assert_eq!(metrics.snapshot().await.rooms.get("s1"), Some(&2));
        metrics.set_room_size("s1", 0).await;
        assert!(metrics.snapshot().await.rooms.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_independent_of_later_writes() {
        let metrics = Metrics::new();
        metrics.set_room_size("s1", 1).await;
        let snapshot = metrics.snapshot().await;
        metrics.set_room_size("s1", 5).await;
        metrics.record_sent(3);
        assert_eq!(snapshot.rooms.get("s1"), Some(&1));
        assert_eq!(snapshot.messages_sent, 0);
    }
}
