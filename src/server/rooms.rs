use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::connection_registry::ConnectionRegistry;
use crate::protocol::{ConnectionId, RoomId, ServerMessage};

/// Normalize a client-supplied room name to `[A-Za-z0-9_.-]`, flattening
/// anything else to an underscore. Room ids travel in URLs and log lines and
/// double as map keys, so every inbound name passes through here before use.
pub fn sanitize_room_id(raw: &str) -> RoomId {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Maps room ids to their member connections.
///
/// A connection belongs to at most one room; joining a new room leaves the
/// old one first. Members are stored as ids only: the outbound channel is
/// resolved through the [`ConnectionRegistry`] at send time, so a member that
/// disconnected between snapshot and send is skipped, never an error.
#[derive(Default)]
pub struct RoomDirectory {
    rooms: DashMap<RoomId, HashSet<ConnectionId>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `room`, leaving any previous room.
    pub fn join(&self, room: &RoomId, connection: ConnectionId, registry: &ConnectionRegistry) {
        match registry.room_of(&connection) {
            Some(current) if current == *room => return,
            Some(current) => self.leave(&current, &connection, registry),
            None => {}
        }

        self.rooms.entry(room.clone()).or_default().insert(connection);
        registry.set_room(&connection, Some(room.clone()));
        tracing::debug!(%connection, %room, "connection joined room");
    }

    /// Remove `connection` from `room`; an emptied room is dropped.
    pub fn leave(&self, room: &RoomId, connection: &ConnectionId, registry: &ConnectionRegistry) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(connection);
            let emptied = members.is_empty();
            drop(members);
            if emptied {
                self.rooms.remove_if(room, |_, members| members.is_empty());
            }
        }
        if registry.room_of(connection).as_ref() == Some(room) {
            registry.set_room(connection, None);
        }
    }

    /// Remove `connection` from whichever room it is in, if any.
    pub fn leave_all(&self, connection: &ConnectionId, registry: &ConnectionRegistry) {
        if let Some(room) = registry.room_of(connection) {
            self.leave(&room, connection, registry);
        }
    }

    /// Snapshot of the member ids of `room`.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn occupancy(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Deliver `message` to every member of `room`, including the sender.
    pub fn broadcast(
        &self,
        room: &RoomId,
        message: Arc<ServerMessage>,
        registry: &ConnectionRegistry,
    ) {
        for member in self.members(room) {
            registry.send_to(&member, message.clone());
        }
    }

    /// Deliver `message` to every member of `room` except `excluded`.
    pub fn broadcast_except(
        &self,
        room: &RoomId,
        excluded: &ConnectionId,
        message: Arc<ServerMessage>,
        registry: &ConnectionRegistry,
    ) {
        for member in self.members(room) {
            if member == *excluded {
                continue;
            }
            registry.send_to(&member, message.clone());
        }
    }

    /// Drop rooms that somehow lost all members without being pruned.
    pub fn prune_empty(&self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, members| !members.is_empty());
        before.saturating_sub(self.rooms.len())
    }
}
