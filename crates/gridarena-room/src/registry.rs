//! Process-wide room registry: room id to handle, creating on demand.

use std::collections::HashMap;

use gridarena_protocol::{Codec, RoomId};
use tokio::sync::RwLock;

use crate::config::RoomConfig;
use crate::room::{RoomHandle, spawn_room};

/// Maps room ids to live handles. Read-mostly: lookups take the read lock;
/// only creation takes the write lock.
///
/// Rooms are never evicted — a handle stays registered for the life of the
/// process, which also keeps its actor alive.
pub struct RoomRegistry<C> {
    defaults: RoomConfig,
    codec: C,
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
}

impl<C: Codec + Clone> RoomRegistry<C> {
    /// Creates an empty registry. New rooms start from `defaults`.
    pub fn new(defaults: RoomConfig, codec: C) -> Self {
        Self {
            defaults,
            codec,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the handle for `room_id`, spawning the room on first use.
    pub async fn get_or_create(&self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.rooms.read().await.get(room_id) {
            return handle.clone();
        }

        let mut rooms = self.rooms.write().await;
        // Re-check under the write lock: another task may have raced us
        // between the two acquisitions.
        if let Some(handle) = rooms.get(room_id) {
            return handle.clone();
        }
        let handle = spawn_room(
            room_id.clone(),
            self.defaults.clone(),
            self.codec.clone(),
        );
        rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        handle
    }

    /// Looks up an existing room without creating it.
    pub async fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Number of rooms currently registered.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Ids of all registered rooms, in no particular order.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }
}
