//! Inbound message dispatch.
//!
//! Every text frame a connection task reads lands in
//! [`GameServer::handle_text_frame`]. Until the connection authenticates,
//! AUTH is the only message that gets interpreted; afterwards each type maps
//! to one handler below. Protocol problems are always answered in-band with
//! an ERROR event, so the worst a bad frame can do is close its own
//! connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use crate::protocol::{
    parse_client_message, ClientMessage, CloseCode, ClockSnapshot, Color, ConnectionId,
    MatchFoundPayload, ReconnectedPayload, RoomId, SeatNames, ServerMessage, StateSyncPayload,
    UserIdentity, START_POSITION, STATUS_PLAYING,
};
use crate::reconnection::ReconnectError;
use crate::storage::{GameResult, GameResultRecord};

use super::{
    sanitize_room_id, EnqueueOutcome, FinishedGame, FormedMatch, GameServer, MoveOutcome,
    ReadyOutcome, ResignOutcome, SeatAssignment, WaitingEntry,
};

impl GameServer {
    /// Parse and route one inbound text frame.
    pub async fn handle_text_frame(&self, connection_id: &ConnectionId, text: &str) {
        match (
            parse_client_message(text),
            self.registry.identity(connection_id),
        ) {
            (Ok(ClientMessage::Auth { token, room }), _) => {
                self.handle_auth(connection_id, token, room).await;
            }
            // Pre-auth, AUTH is the only message the gate lets through.
            (_, None) => self.send_error(connection_id, "auth required"),
            (Ok(message), Some(identity)) => {
                self.dispatch(connection_id, identity, message).await;
            }
            (Err(err), Some(_)) => {
                tracing::debug!(%connection_id, error = %err, "rejected inbound frame");
                self.send_error(connection_id, &err.to_string());
            }
        }
    }

    async fn dispatch(
        &self,
        connection_id: &ConnectionId,
        identity: UserIdentity,
        message: ClientMessage,
    ) {
        match message {
            // Routed by handle_text_frame before dispatch.
            ClientMessage::Auth { .. } => {}
            ClientMessage::StateRequest { room } => {
                self.handle_state_request(connection_id, given_room(room))
                    .await;
            }
            ClientMessage::Matchmake { room } => {
                self.handle_matchmake(connection_id, identity, given_room(room));
            }
            ClientMessage::MoveSubmit { game_move } => {
                self.handle_move(connection_id, &identity, game_move);
            }
            ClientMessage::Ready => self.handle_ready(connection_id, &identity),
            ClientMessage::Resign => self.handle_resign(connection_id, &identity).await,
            ClientMessage::Reconnect { token } => {
                self.handle_reconnect(connection_id, &identity, token).await;
            }
            ClientMessage::MatchFound { room } => {
                self.handle_match_found_relay(connection_id, &identity, given_room(room));
            }
            ClientMessage::RoomJoin { room } => {
                self.handle_room_join(connection_id, given_room(room)).await;
            }
            ClientMessage::Ping => {
                self.registry
                    .send_to(connection_id, Arc::new(ServerMessage::Pong));
            }
        }
    }

    /// AUTH: verify the bearer credential, bind the identity, enter
    /// presence, and seat the connection in a requested room if one was
    /// named in the message or the upgrade query.
    async fn handle_auth(
        &self,
        connection_id: &ConnectionId,
        token: Option<String>,
        room: Option<RoomId>,
    ) {
        if self.registry.identity(connection_id).is_some() {
            self.send_error(connection_id, "already authenticated");
            return;
        }

        let Some(token) = token.filter(|token| !token.is_empty()) else {
            self.metrics.increment_auth_failures();
            self.send_error(connection_id, "no token provided");
            self.registry.close(connection_id, CloseCode::MissingToken);
            return;
        };

        match self.verifier.verify_credential(&token).await {
            Ok(identity) => {
                self.metrics.increment_auth_successes();
                self.registry
                    .send_to(connection_id, Arc::new(ServerMessage::AuthOk));
                let room = given_room(room).or_else(|| self.registry.take_room_hint(connection_id));
                self.complete_authentication(connection_id, identity, room);
            }
            Err(err) => {
                self.metrics.increment_auth_failures();
                tracing::warn!(%connection_id, error = %err, "authentication failed");
                self.send_error(connection_id, &err.to_string());
                self.registry.close(connection_id, CloseCode::AuthFailed);
            }
        }
    }

    /// Bind `identity` to the connection and announce it. Shared by in-band
    /// AUTH and the handshake path where the upgrade request itself carried
    /// a valid credential (that path never sends AUTH_OK).
    pub(crate) fn complete_authentication(
        &self,
        connection_id: &ConnectionId,
        identity: UserIdentity,
        room: Option<RoomId>,
    ) {
        self.registry.set_identity(connection_id, identity.clone());
        self.presence
            .join(*connection_id, identity.clone(), &self.registry);
        if let Some(room) = room {
            self.rooms.join(&room, *connection_id, &self.registry);
        }
        tracing::info!(%connection_id, user = %identity.username, "authenticated");
    }

    /// STATE_REQUEST: optionally seat the sender in `room`, then reply with
    /// that room's live state, or a placeholder snapshot when no game is
    /// attached to it.
    async fn handle_state_request(&self, connection_id: &ConnectionId, room: Option<RoomId>) {
        if let Some(room) = &room {
            self.rooms.join(room, *connection_id, &self.registry);
        }
        let room = room.or_else(|| self.registry.room_of(connection_id));
        let payload = match &room {
            Some(room) => self.live_state(room).await,
            None => None,
        };
        let payload = payload.unwrap_or_else(|| self.placeholder_state());
        self.registry
            .send_to(connection_id, Arc::new(ServerMessage::StateSync { payload }));
    }

    /// MATCHMAKE: queue the sender, or pair it with whoever was already
    /// waiting.
    fn handle_matchmake(
        &self,
        connection_id: &ConnectionId,
        identity: UserIdentity,
        room: Option<RoomId>,
    ) {
        self.metrics.increment_matchmaking_requests();
        match self
            .matchmaking
            .enqueue(WaitingEntry::new(*connection_id, identity), room)
        {
            EnqueueOutcome::Queued => {
                self.registry
                    .send_to(connection_id, Arc::new(ServerMessage::MatchQueued));
            }
            EnqueueOutcome::Paired(formed) => self.announce_match(*formed, connection_id),
        }
    }

    /// Seat a formed pairing: mint one reconnect token per player, create
    /// the room's clock, join both connections, deliver MATCH_FOUND to each
    /// side, then announce GAME_READY to the room. Only the requester's copy
    /// carries the starting clocks.
    fn announce_match(&self, formed: FormedMatch, requester: &ConnectionId) {
        let (white_token, black_token) = match (
            self.reconnect_tokens
                .mint(formed.room.clone(), Some(formed.white.user.id)),
            self.reconnect_tokens
                .mint(formed.room.clone(), Some(formed.black.user.id)),
        ) {
            (Ok(white), Ok(black)) => (white, black),
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!(room = %formed.room, error = %err, "reconnect token mint failed");
                for participant in formed.participants() {
                    self.send_error(&participant.connection, &err.to_string());
                }
                return;
            }
        };

        let players = formed.seat_names();
        let clocks = self.clocks.create_for_match(
            formed.room.clone(),
            SeatAssignment {
                user_id: formed.white.user.id,
                username: formed.white.user.username.clone(),
            },
            SeatAssignment {
                user_id: formed.black.user.id,
                username: formed.black.user.username.clone(),
            },
        );
        self.metrics.increment_matches_formed();

        for participant in formed.participants() {
            self.rooms
                .join(&formed.room, participant.connection, &self.registry);
        }

        for (participant, token) in [(&formed.white, white_token), (&formed.black, black_token)] {
            self.metrics.increment_reconnect_tokens_issued();
            let payload = MatchFoundPayload {
                room: formed.room.clone(),
                players: players.clone(),
                clocks: (participant.connection == *requester).then_some(clocks),
                reconnect_token: token,
            };
            self.registry.send_to(
                &participant.connection,
                Arc::new(ServerMessage::MatchFound { payload }),
            );
        }

        self.rooms.broadcast(
            &formed.room,
            Arc::new(ServerMessage::GameReady {
                room: formed.room.clone(),
                players,
            }),
            &self.registry,
        );
    }

    /// MOVE_SUBMIT: deduct time from the mover, flip the turn, relay. A
    /// missing move field falls back to a placeholder opening move.
    fn handle_move(
        &self,
        connection_id: &ConnectionId,
        identity: &UserIdentity,
        game_move: Option<serde_json::Value>,
    ) {
        let Some(room) = self.registry.room_of(connection_id) else {
            self.send_error(connection_id, "not in a game room");
            return;
        };
        let game_move = game_move.unwrap_or_else(|| json!({"from": "e2", "to": "e4"}));
        match self
            .clocks
            .apply_move(&room, &identity.id, game_move, &self.rooms, &self.registry)
        {
            MoveOutcome::Applied => self.metrics.increment_moves_relayed(),
            MoveOutcome::NotRunning => self.send_error(connection_id, "game not started"),
            MoveOutcome::NotYourTurn => self.send_error(connection_id, "not your turn"),
            MoveOutcome::NoClock => self.send_error(connection_id, "not in a game room"),
        }
    }

    /// READY: record readiness; the second distinct participant starts the
    /// game clock.
    fn handle_ready(&self, connection_id: &ConnectionId, identity: &UserIdentity) {
        let Some(room) = self.registry.room_of(connection_id) else {
            self.send_error(connection_id, "not in a game room");
            return;
        };
        match self
            .clocks
            .mark_ready(&room, identity.id, &self.rooms, &self.registry)
        {
            ReadyOutcome::Started => self.metrics.increment_games_started(),
            ReadyOutcome::Confirmed => {
                self.registry
                    .send_to(connection_id, Arc::new(ServerMessage::ReadyConfirmed));
            }
            ReadyOutcome::NoClock => self.send_error(connection_id, "not in a game room"),
        }
    }

    /// RESIGN: end the game in the opponent's favor and hand the record to
    /// the results store. Persistence is best-effort; the game is over for
    /// the players either way.
    async fn handle_resign(&self, connection_id: &ConnectionId, identity: &UserIdentity) {
        let Some(room) = self.registry.room_of(connection_id) else {
            self.send_error(connection_id, "not in a game room");
            return;
        };
        match self
            .clocks
            .resign(&room, &identity.id, &self.rooms, &self.registry)
        {
            ResignOutcome::Ended(finished) => {
                self.metrics.increment_games_completed();
                self.record_resignation(*finished).await;
            }
            ResignOutcome::NotParticipant => {
                self.send_error(connection_id, "not a game participant");
            }
            ResignOutcome::NoClock => self.send_error(connection_id, "not in a game room"),
        }
    }

    async fn record_resignation(&self, finished: FinishedGame) {
        let record = GameResultRecord {
            white_id: finished.white.user_id,
            black_id: finished.black.user_id,
            winner_id: Some(finished.winner_seat().user_id),
            loser_id: Some(finished.loser_seat().user_id),
            result: GameResult::Resigned,
            vs_ai: false,
            recorded_at: chrono::Utc::now(),
        };
        if let Err(err) = self.results.persist_game_result(record).await {
            tracing::warn!(room = %finished.room, error = %err, "failed to persist game result");
        }
    }

    /// RECONNECT: redeem a single-use token, rejoin its room, and catch the
    /// player up. The reply carries a replacement token so the next drop can
    /// be survived too; other room members only learn that the player is
    /// back.
    async fn handle_reconnect(
        &self,
        connection_id: &ConnectionId,
        identity: &UserIdentity,
        token: Option<String>,
    ) {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            self.send_error(connection_id, "token required");
            return;
        };

        let issued = match self.reconnect_tokens.consume(&token, Some(&identity.id)) {
            Ok(issued) => issued,
            Err(err @ ReconnectError::Mismatch) => {
                self.metrics.increment_reconnects_rejected();
                tracing::warn!(%connection_id, error = %err, "reconnect rejected");
                self.send_error(connection_id, "token user mismatch");
                return;
            }
            Err(err) => {
                self.metrics.increment_reconnects_rejected();
                tracing::debug!(%connection_id, error = %err, "reconnect rejected");
                self.send_error(connection_id, "invalid token");
                return;
            }
        };

        let room = issued.room;
        self.rooms.join(&room, *connection_id, &self.registry);

        if let Some(payload) = self.live_state(&room).await {
            self.registry
                .send_to(connection_id, Arc::new(ServerMessage::StateSync { payload }));
        }

        // The consumed token is gone; rotate in a fresh one.
        let fresh = match self.reconnect_tokens.mint(room.clone(), Some(identity.id)) {
            Ok(fresh) => {
                self.metrics.increment_reconnect_tokens_issued();
                Some(fresh)
            }
            Err(err) => {
                tracing::error!(%room, error = %err, "reconnect token mint failed");
                None
            }
        };

        let running = self.clocks.running_state(&room);
        self.registry.send_to(
            connection_id,
            Arc::new(ServerMessage::PlayerReconnected {
                payload: ReconnectedPayload {
                    room: room.clone(),
                    user: identity.clone(),
                    reconnect_token: fresh,
                    clocks: running.map(|(clocks, _)| clocks),
                    active_player: running.map(|(_, active)| active),
                },
            }),
        );

        self.rooms.broadcast_except(
            &room,
            connection_id,
            Arc::new(ServerMessage::PlayerReconnected {
                payload: ReconnectedPayload {
                    room: room.clone(),
                    user: identity.clone(),
                    reconnect_token: None,
                    clocks: None,
                    active_player: None,
                },
            }),
            &self.registry,
        );

        self.metrics.increment_reconnects_completed();
        tracing::info!(%room, user = %identity.username, "player reconnected");
    }

    /// MATCH_FOUND sent *by* a client: reflect a match envelope back at the
    /// sender for the named room (or their current room, or the demo room).
    /// Demo clients use this to exercise the match screen without an
    /// opponent; no room membership or clock is touched.
    fn handle_match_found_relay(
        &self,
        connection_id: &ConnectionId,
        identity: &UserIdentity,
        room: Option<RoomId>,
    ) {
        let room = room
            .or_else(|| self.registry.room_of(connection_id))
            .unwrap_or_else(|| "demo-room".to_string());

        let token = match self.reconnect_tokens.mint(room.clone(), Some(identity.id)) {
            Ok(token) => {
                self.metrics.increment_reconnect_tokens_issued();
                token
            }
            Err(err) => {
                tracing::error!(%room, error = %err, "reconnect token mint failed");
                self.send_error(connection_id, &err.to_string());
                return;
            }
        };

        let payload = MatchFoundPayload {
            room,
            players: SeatNames {
                white: identity.username.clone(),
                black: "opponent".to_string(),
            },
            clocks: None,
            reconnect_token: token,
        };
        self.registry.send_to(
            connection_id,
            Arc::new(ServerMessage::MatchFound { payload }),
        );
    }

    /// ROOM_JOIN: seat the sender in `room`, catch them up if a game is in
    /// progress there, then confirm.
    async fn handle_room_join(&self, connection_id: &ConnectionId, room: Option<RoomId>) {
        let Some(room) = room else {
            self.send_error(connection_id, "room required");
            return;
        };
        self.rooms.join(&room, *connection_id, &self.registry);
        if let Some(payload) = self.live_state(&room).await {
            self.registry
                .send_to(connection_id, Arc::new(ServerMessage::StateSync { payload }));
        }
        self.registry
            .send_to(connection_id, Arc::new(ServerMessage::RoomJoined { room }));
    }

    /// Live snapshot of `room` with seat names refined through the profile
    /// store. A lookup miss or failure falls back to the name recorded when
    /// the match formed.
    async fn live_state(&self, room: &RoomId) -> Option<StateSyncPayload> {
        let mut payload = self.clocks.state_payload(room)?;
        if let Some((white, black)) = self.clocks.seats(room) {
            payload
                .players
                .insert("white".to_string(), self.display_name(&white).await);
            payload
                .players
                .insert("black".to_string(), self.display_name(&black).await);
        }
        Some(payload)
    }

    async fn display_name(&self, seat: &SeatAssignment) -> String {
        match self.profiles.lookup_profile(&seat.user_id).await {
            Ok(Some(profile)) => profile.username,
            Ok(None) => seat.username.clone(),
            Err(err) => {
                tracing::warn!(user_id = %seat.user_id, error = %err, "profile lookup failed");
                seat.username.clone()
            }
        }
    }

    /// Snapshot served for rooms with no attached game: fresh position,
    /// white to move, untouched clocks.
    fn placeholder_state(&self) -> StateSyncPayload {
        let initial = self.config.session.initial_clock_ms;
        StateSyncPayload {
            fen: START_POSITION.to_string(),
            turn: Color::White,
            clocks: ClockSnapshot {
                white_ms: initial,
                black_ms: initial,
            },
            status: STATUS_PLAYING.to_string(),
            players: BTreeMap::new(),
            active_player: None,
        }
    }

    pub(crate) fn send_error(&self, connection_id: &ConnectionId, message: &str) {
        self.registry
            .send_to(connection_id, Arc::new(ServerMessage::error(message)));
    }
}

/// Inbound room fields treat the empty string as absent; anything else is
/// normalized before it becomes a group key.
fn given_room(room: Option<RoomId>) -> Option<RoomId> {
    room.filter(|room| !room.is_empty())
        .map(|room| sanitize_room_id(&room))
}
