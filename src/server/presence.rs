use std::sync::Arc;

use dashmap::DashMap;

use super::connection_registry::ConnectionRegistry;
use crate::protocol::{ConnectionId, ServerMessage, UserIdentity};

/// Every currently authenticated connection, independent of room membership.
///
/// Entries are added on successful authentication and removed only by
/// disconnect handling. Join events are suppressed for connections that carry
/// the same user identity as the joiner, so a player never hears about
/// themselves coming online.
#[derive(Default)]
pub struct PresenceRegistry {
    members: DashMap<ConnectionId, UserIdentity>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly authenticated connection and announce it to everyone
    /// else online.
    pub fn join(
        &self,
        connection_id: ConnectionId,
        identity: UserIdentity,
        registry: &ConnectionRegistry,
    ) {
        self.members.insert(connection_id, identity.clone());

        let event = Arc::new(ServerMessage::PlayerJoined {
            user: identity.clone(),
        });
        for entry in self.members.iter() {
            if entry.value().id == identity.id {
                continue;
            }
            registry.send_to(entry.key(), event.clone());
        }
        tracing::debug!(user = %identity.username, "player joined presence");
    }

    /// Drop a connection from presence and tell the remaining members.
    /// Returns the identity that was registered, if any.
    pub fn leave(
        &self,
        connection_id: &ConnectionId,
        registry: &ConnectionRegistry,
    ) -> Option<UserIdentity> {
        let (_, identity) = self.members.remove(connection_id)?;

        let event = Arc::new(ServerMessage::PlayerDisconnected {
            user: identity.clone(),
        });
        for entry in self.members.iter() {
            registry.send_to(entry.key(), event.clone());
        }
        tracing::debug!(user = %identity.username, "player left presence");
        Some(identity)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains_key(connection_id)
    }

    pub fn online_count(&self) -> usize {
        self.members.len()
    }
}
