use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::metrics::ServerMetrics;
use crate::protocol::{CloseCode, ConnectionId, RoomId, ServerMessage, UserIdentity};

/// Frame handed to a connection's writer task.
///
/// Ordinary traffic is an `Arc`'d server message so room broadcasts share one
/// serialization. `Close` asks the writer to emit a close frame with the
/// given code and then stop; anything queued behind it is dropped.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Arc<ServerMessage>),
    Close(CloseCode),
}

/// Book-keeping for one live transport session.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub sender: mpsc::Sender<Outbound>,
    pub addr: SocketAddr,
    /// Set exactly once, when the credential handshake succeeds.
    pub user: Option<UserIdentity>,
    /// The room this connection currently belongs to, if any.
    pub room: Option<RoomId>,
    /// Room requested in the upgrade query string, consumed at AUTH time.
    pub room_hint: Option<RoomId>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum RegisterClientError {
    #[error("too many connections from your address ({current}/{limit})")]
    IpLimitExceeded { current: usize, limit: usize },
}

/// Process-wide map of live connections plus per-address admission control.
///
/// Everything else in the server refers to connections by id and resolves the
/// outbound channel through this registry at send time, so a connection that
/// has already gone away is simply skipped rather than poisoning room or
/// presence state.
pub struct ConnectionRegistry {
    clients: DashMap<ConnectionId, ClientConnection>,
    ip_connections: DashMap<IpAddr, usize>,
    max_connections_per_ip: usize,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionRegistry {
    pub fn new(max_connections_per_ip: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            ip_connections: DashMap::new(),
            max_connections_per_ip,
            metrics,
        }
    }

    /// Admit a new connection, enforcing the per-address cap.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Outbound>,
        addr: SocketAddr,
    ) -> Result<(), RegisterClientError> {
        if let Err(err) = self.try_reserve_ip_slot(addr.ip()) {
            self.metrics.increment_connections_rejected();
            return Err(err);
        }

        self.clients.insert(
            connection_id,
            ClientConnection {
                sender,
                addr,
                user: None,
                room: None,
                room_hint: None,
                connected_at: Utc::now(),
            },
        );
        self.metrics.increment_total_connections();
        Ok(())
    }

    /// Register a connection without address accounting (test fixtures).
    pub fn register_test_client(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Outbound>,
    ) {
        let addr: SocketAddr = SocketAddr::from(([127, 0, 0, 1], 0));
        self.clients.insert(
            connection_id,
            ClientConnection {
                sender,
                addr,
                user: None,
                room: None,
                room_hint: None,
                connected_at: Utc::now(),
            },
        );
        self.metrics.increment_total_connections();
    }

    /// Remove a connection and free its address slot. Idempotent.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ClientConnection> {
        let (_, connection) = self.clients.remove(connection_id)?;
        self.release_ip_slot(connection.addr.ip());
        Some(connection)
    }

    pub fn set_identity(&self, connection_id: &ConnectionId, user: UserIdentity) {
        if let Some(mut connection) = self.clients.get_mut(connection_id) {
            connection.user = Some(user);
        }
    }

    pub fn identity(&self, connection_id: &ConnectionId) -> Option<UserIdentity> {
        self.clients
            .get(connection_id)
            .and_then(|connection| connection.user.clone())
    }

    pub fn set_room_hint(&self, connection_id: &ConnectionId, room: RoomId) {
        if let Some(mut connection) = self.clients.get_mut(connection_id) {
            connection.room_hint = Some(room);
        }
    }

    pub fn take_room_hint(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.clients
            .get_mut(connection_id)
            .and_then(|mut connection| connection.room_hint.take())
    }

    pub fn set_room(&self, connection_id: &ConnectionId, room: Option<RoomId>) {
        if let Some(mut connection) = self.clients.get_mut(connection_id) {
            connection.room = room;
        }
    }

    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.clients
            .get(connection_id)
            .and_then(|connection| connection.room.clone())
    }

    /// Best-effort delivery. A full or closed channel drops the frame rather
    /// than blocking the caller; a stale id is skipped silently.
    pub fn send_to(&self, connection_id: &ConnectionId, message: Arc<ServerMessage>) -> bool {
        let Some(connection) = self.clients.get(connection_id) else {
            return false;
        };
        match connection.sender.try_send(Outbound::Message(message)) {
            Ok(()) => true,
            Err(_) => {
                self.metrics.increment_messages_dropped();
                tracing::debug!(%connection_id, "dropped outbound message for slow or closed client");
                false
            }
        }
    }

    /// Ask the connection's writer to close with `code`.
    pub fn close(&self, connection_id: &ConnectionId, code: CloseCode) {
        if let Some(connection) = self.clients.get(connection_id) {
            if connection.sender.try_send(Outbound::Close(code)).is_err() {
                tracing::debug!(%connection_id, %code, "close request dropped, writer already gone");
            }
        }
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.clients.contains_key(connection_id)
    }

    pub fn connected_count(&self) -> usize {
        self.clients.len()
    }

    fn try_reserve_ip_slot(&self, ip: IpAddr) -> Result<(), RegisterClientError> {
        if self.max_connections_per_ip == 0 {
            return Ok(());
        }
        let mut slot = self.ip_connections.entry(ip).or_insert(0);
        if *slot >= self.max_connections_per_ip {
            return Err(RegisterClientError::IpLimitExceeded {
                current: *slot,
                limit: self.max_connections_per_ip,
            });
        }
        *slot += 1;
        Ok(())
    }

    fn release_ip_slot(&self, ip: IpAddr) {
        if self.max_connections_per_ip == 0 {
            return;
        }
        if let Some(mut slot) = self.ip_connections.get_mut(&ip) {
            *slot = slot.saturating_sub(1);
            let drained = *slot == 0;
            drop(slot);
            if drained {
                self.ip_connections.remove_if(&ip, |_, count| *count == 0);
            }
        }
    }
}
