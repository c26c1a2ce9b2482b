use std::collections::HashMap;
use std::sync::Arc;

use crate::models::client::Connection;

/// Room name → member connections. Owned and mutated exclusively by the hub
/// control loop, so it carries no locking of its own.
///
/// Invariant: a room present in the index has at least one member; the last
/// member leaving deletes the entry.
#[derive(Default)]
pub struct RoomIndex {
    rooms: HashMap<String, HashMap<Arc<str>, Arc<Connection>>>,
}

impl RoomIndex {
    /// Returns true if the connection was not already a member.
    pub fn add(&mut self, room: &str, conn: &Arc<Connection>) -> bool {
        self.rooms
            .entry(room.to_owned())
            .or_default()
            .insert(conn.id.clone(), conn.clone())
            .is_none()
    }

    /// Returns true if the connection was a member. Deletes the room when
    /// it becomes empty.
    pub fn remove(&mut self, room: &str, id: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(id).is_some();
        if members.is_empty() {
            let _ = self.rooms.remove(room);
        }
        removed
    }

    pub fn members(&self, room: &str) -> Vec<Arc<Connection>> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn size(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, HashMap::len)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}
