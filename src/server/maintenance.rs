use super::GameServer;

impl GameServer {
    /// Periodic sweep for state that outlived its owners: reconnect tokens
    /// past their TTL, clocks nobody has touched for too long, and rooms with
    /// no members left. Runs until the server future is dropped.
    pub async fn maintenance_task(&self) {
        let mut interval = tokio::time::interval(self.config.session.maintenance_interval());

        loop {
            interval.tick().await;

            let tokens = self.reconnect_tokens.sweep_expired();
            if tokens > 0 {
                self.metrics.add_expired_tokens_swept(tokens as u64);
            }

            let clocks = self.clocks.sweep_stale();
            if clocks > 0 {
                self.metrics.add_stale_clocks_swept(clocks as u64);
            }

            let rooms = self.rooms.prune_empty();
            if rooms > 0 {
                self.metrics.add_empty_rooms_pruned(rooms as u64);
                tracing::info!(count = rooms, "pruned empty rooms");
            }

            tracing::debug!(
                connections = self.connected_count(),
                online = self.online_count(),
                games = self.active_games(),
                waiting = self.waiting_count(),
                pending_tokens = self.pending_reconnect_tokens(),
                "maintenance sweep complete"
            );
        }
    }
}
