use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{
    ClockSnapshot, GameEndPayload, MatchFoundPayload, MoveAppliedPayload, ReconnectedPayload,
    RoomId, SeatNames, StateSyncPayload, UserIdentity,
};

/// Messages sent from client to server.
///
/// The wire shape is a flat JSON object: the SCREAMING_SNAKE `type`
/// discriminator sits beside the payload fields, one object per text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Bearer-credential handshake. Required as the first message unless the
    /// upgrade request already authenticated via `Authorization` header.
    /// `room` optionally pre-selects a room to join on success.
    Auth {
        token: Option<String>,
        room: Option<RoomId>,
    },
    /// Ask for a state snapshot, optionally joining `room` first.
    StateRequest { room: Option<RoomId> },
    /// Enter the matchmaking queue, or pair immediately with a waiting player.
    /// `room` overrides the generated room name for the formed match.
    Matchmake { room: Option<RoomId> },
    /// Submit a move in the running game. The payload is opaque here; rule
    /// validation is the engine's job, this server only keeps turn and clock.
    MoveSubmit {
        #[serde(rename = "move")]
        game_move: Option<serde_json::Value>,
    },
    /// Confirm readiness to start the matched game.
    Ready,
    /// Concede the game in the current room.
    Resign,
    /// Rejoin a previous room with a one-time reconnect token.
    Reconnect { token: Option<String> },
    /// Rebuild the sender's own MATCH_FOUND envelope for `room` (used by
    /// clients that navigated away before the original delivery landed).
    MatchFound { room: Option<RoomId> },
    /// Join a named room.
    RoomJoin { room: Option<RoomId> },
    /// Liveness probe; always answered with PONG.
    Ping,
}

/// Messages sent from server to client, same flat-tagged wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    AuthOk,
    Error { message: String },
    StateSync { payload: StateSyncPayload },
    PlayerJoined { user: UserIdentity },
    PlayerDisconnected { user: UserIdentity },
    MatchQueued,
    MatchFound { payload: MatchFoundPayload },
    GameReady { room: RoomId, players: SeatNames },
    GameStart { room: RoomId, clocks: ClockSnapshot },
    MoveApplied { payload: MoveAppliedPayload },
    GameEnd { payload: GameEndPayload },
    ReadyConfirmed,
    PlayerReconnected { payload: ReconnectedPayload },
    RoomJoined { room: RoomId },
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// Discriminator strings this server understands. Anything else on the wire
/// is answered with "unknown message type" and logged.
const KNOWN_TYPES: [&str; 10] = [
    "AUTH",
    "STATE_REQUEST",
    "MATCHMAKE",
    "MOVE_SUBMIT",
    "READY",
    "RESIGN",
    "RECONNECT",
    "MATCH_FOUND",
    "ROOM_JOIN",
    "PING",
];

/// Why an inbound text frame could not be turned into a [`ClientMessage`].
///
/// None of these are fatal: each maps to an ERROR reply and the connection
/// stays open.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown message type")]
    UnknownType(String),
    #[error("malformed {kind} message")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid message format")]
    NotAnEnvelope,
}

/// Parse one inbound text frame, classifying failures so the dispatcher can
/// distinguish an unknown discriminator from a known type with bad fields.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, FrameError> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => Ok(message),
        Err(primary) => {
            let kind = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|value| {
                    value
                        .get("type")
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_owned)
                });
            match kind {
                Some(kind) if !KNOWN_TYPES.contains(&kind.as_str()) => {
                    Err(FrameError::UnknownType(kind))
                }
                Some(kind) => Err(FrameError::Malformed {
                    kind,
                    source: primary,
                }),
                None => Err(FrameError::NotAnEnvelope),
            }
        }
    }
}
