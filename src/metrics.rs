use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the session server's hot paths.
///
/// Everything here is a monotonic counter except `active_connections`, which
/// is a gauge that must never underflow even if disconnect accounting races.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection lifecycle
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub messages_dropped: AtomicU64,

    // Authentication
    pub auth_successes: AtomicU64,
    pub auth_failures: AtomicU64,
    pub auth_timeouts: AtomicU64,

    // Matchmaking
    pub matchmaking_requests: AtomicU64,
    pub matches_formed: AtomicU64,

    // Game lifecycle
    pub games_started: AtomicU64,
    pub games_completed: AtomicU64,
    pub moves_relayed: AtomicU64,

    // Reconnection
    pub reconnect_tokens_issued: AtomicU64,
    pub reconnects_completed: AtomicU64,
    pub reconnects_rejected: AtomicU64,

    // Maintenance sweeps
    pub expired_tokens_swept: AtomicU64,
    pub stale_clocks_swept: AtomicU64,
    pub empty_rooms_pruned: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            });
    }

    pub fn increment_connections_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_successes(&self) {
        self.auth_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_timeouts(&self) {
        self.auth_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matchmaking_requests(&self) {
        self.matchmaking_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matches_formed(&self) {
        self.matches_formed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_completed(&self) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_moves_relayed(&self) {
        self.moves_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnect_tokens_issued(&self) {
        self.reconnect_tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects_completed(&self) {
        self.reconnects_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects_rejected(&self) {
        self.reconnects_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_expired_tokens_swept(&self, count: u64) {
        self.expired_tokens_swept.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_stale_clocks_swept(&self, count: u64) {
        self.stale_clocks_swept.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_empty_rooms_pruned(&self, count: u64) {
        self.empty_rooms_pruned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            auth_successes: self.auth_successes.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            auth_timeouts: self.auth_timeouts.load(Ordering::Relaxed),
            matchmaking_requests: self.matchmaking_requests.load(Ordering::Relaxed),
            matches_formed: self.matches_formed.load(Ordering::Relaxed),
            games_started: self.games_started.load(Ordering::Relaxed),
            games_completed: self.games_completed.load(Ordering::Relaxed),
            moves_relayed: self.moves_relayed.load(Ordering::Relaxed),
            reconnect_tokens_issued: self.reconnect_tokens_issued.load(Ordering::Relaxed),
            reconnects_completed: self.reconnects_completed.load(Ordering::Relaxed),
            reconnects_rejected: self.reconnects_rejected.load(Ordering::Relaxed),
            expired_tokens_swept: self.expired_tokens_swept.load(Ordering::Relaxed),
            stale_clocks_swept: self.stale_clocks_swept.load(Ordering::Relaxed),
            empty_rooms_pruned: self.empty_rooms_pruned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of every counter, as served by the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub connections_rejected: u64,
    pub messages_dropped: u64,
    pub auth_successes: u64,
    pub auth_failures: u64,
    pub auth_timeouts: u64,
    pub matchmaking_requests: u64,
    pub matches_formed: u64,
    pub games_started: u64,
    pub games_completed: u64,
    pub moves_relayed: u64,
    pub reconnect_tokens_issued: u64,
    pub reconnects_completed: u64,
    pub reconnects_rejected: u64,
    pub expired_tokens_swept: u64,
    pub stale_clocks_swept: u64,
    pub empty_rooms_pruned: u64,
}
