//! Server composition root.
//!
//! [`GameServer`] owns every shared service (connection registry, presence,
//! rooms, the matchmaking queue, game clocks, reconnect tokens) plus the
//! external collaborators: credential verifier, result and profile storage.
//! Message semantics live in [`message_router`], periodic cleanup in
//! [`maintenance`]; both are `impl GameServer` blocks so the transport layer
//! only ever talks to this one type.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{CredentialVerifier, StaticTokenVerifier};
use crate::config::Config;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use crate::protocol::{CloseCode, ConnectionId, RoomId};
use crate::reconnection::ReconnectTokenStore;
use crate::storage::{create_storage, GameResultStore, ProfileStore};

mod connection_registry;
mod game_clock;
mod maintenance;
mod matchmaking;
mod message_router;
mod presence;
mod rooms;

#[cfg(test)]
mod message_router_tests;

pub use connection_registry::{ClientConnection, ConnectionRegistry, Outbound, RegisterClientError};
pub use game_clock::{
    FinishedGame, GameClockService, MoveOutcome, ReadyOutcome, ResignOutcome, SeatAssignment,
};
pub use matchmaking::{EnqueueOutcome, FormedMatch, MatchmakingQueue, WaitingEntry};
pub use presence::PresenceRegistry;
pub use rooms::{sanitize_room_id, RoomDirectory};

/// The in-memory session server.
///
/// All state is process-local; a restart forgets every room, queue entry,
/// clock, and token. One instance is shared behind an `Arc` by every
/// connection task and the maintenance task.
pub struct GameServer {
    config: Config,
    registry: ConnectionRegistry,
    presence: PresenceRegistry,
    rooms: RoomDirectory,
    matchmaking: MatchmakingQueue,
    clocks: GameClockService,
    reconnect_tokens: ReconnectTokenStore,
    verifier: Arc<dyn CredentialVerifier>,
    results: Arc<dyn GameResultStore>,
    profiles: Arc<dyn ProfileStore>,
    metrics: Arc<ServerMetrics>,
}

impl GameServer {
    /// Build a server with the default collaborators: the static token
    /// verifier fed from `[auth]` and in-memory result/profile storage.
    pub fn new(config: Config) -> Self {
        let verifier = Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone()));
        let storage = create_storage();
        Self::with_collaborators(config, verifier, storage.clone(), storage)
    }

    /// Build a server around explicit collaborator implementations.
    pub fn with_collaborators(
        config: Config,
        verifier: Arc<dyn CredentialVerifier>,
        results: Arc<dyn GameResultStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        Self {
            registry: ConnectionRegistry::new(
                config.server.max_connections_per_ip,
                metrics.clone(),
            ),
            presence: PresenceRegistry::new(),
            rooms: RoomDirectory::new(),
            matchmaking: MatchmakingQueue::new(),
            clocks: GameClockService::new(
                config.session.initial_clock_ms,
                config.session.clock_stale_after(),
            ),
            reconnect_tokens: ReconnectTokenStore::new(config.session.reconnect_ttl_secs),
            verifier,
            results,
            profiles,
            metrics,
            config,
        }
    }

    /// Admit a new transport connection.
    pub fn register_client(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Outbound>,
        addr: SocketAddr,
    ) -> Result<(), RegisterClientError> {
        self.registry.register(connection_id, sender, addr)?;
        tracing::info!(%connection_id, %addr, "client connected");
        Ok(())
    }

    /// Tear down a connection: purge its queue entry, withdraw pre-start
    /// readiness, leave its room, leave presence, then drop the registry
    /// entry. Idempotent: a second call for the same id is a no-op.
    pub fn unregister_client(&self, connection_id: &ConnectionId) {
        self.matchmaking.remove_connection(connection_id);

        if let (Some(identity), Some(room)) = (
            self.registry.identity(connection_id),
            self.registry.room_of(connection_id),
        ) {
            if self.clocks.handle_disconnect(&room, &identity.id) {
                tracing::info!(%room, "match abandoned before start");
            }
        }

        self.rooms.leave_all(connection_id, &self.registry);
        self.presence.leave(connection_id, &self.registry);

        if self.registry.remove(connection_id).is_some() {
            self.metrics.decrement_active_connections();
            tracing::info!(%connection_id, "client disconnected");
        }
    }

    /// Register a synthetic client and hand back its outbound queue. Test
    /// support: no address accounting, queue sized from config.
    pub fn connect_client(&self) -> (ConnectionId, mpsc::Receiver<Outbound>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.config.server.outbound_queue);
        self.registry.register_test_client(connection_id, tx);
        (connection_id, rx)
    }

    pub fn is_authenticated(&self, connection_id: &ConnectionId) -> bool {
        self.registry.identity(connection_id).is_some()
    }

    /// Enqueue a close frame for the connection's writer task.
    pub(crate) fn close_connection(&self, connection_id: &ConnectionId, code: CloseCode) {
        self.registry.close(connection_id, code);
    }

    /// Stash a room requested in the upgrade query until AUTH consumes it.
    pub(crate) fn set_room_hint(&self, connection_id: &ConnectionId, room: RoomId) {
        self.registry.set_room_hint(connection_id, room);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verifier(&self) -> &dyn CredentialVerifier {
        self.verifier.as_ref()
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn connected_count(&self) -> usize {
        self.registry.connected_count()
    }

    pub fn online_count(&self) -> usize {
        self.presence.online_count()
    }

    pub fn waiting_count(&self) -> usize {
        self.matchmaking.waiting_count()
    }

    pub fn active_games(&self) -> usize {
        self.clocks.active_count()
    }

    pub fn pending_reconnect_tokens(&self) -> usize {
        self.reconnect_tokens.pending()
    }
}
