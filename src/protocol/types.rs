use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a platform account, resolved by the credential verifier.
pub type UserId = Uuid;

/// Identifier of one live transport session. Regenerated per connection,
/// never reused, and never exposed on the wire.
pub type ConnectionId = Uuid;

/// Room names are client-visible strings (sanitized before use as group keys).
pub type RoomId = String;

/// Identity attached to a connection after successful authentication.
/// Immutable for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: String,
}

/// Side assignment for one match participant. Serialized as `"w"` / `"b"`,
/// the notation the clients already speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "w",
            Color::Black => "b",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaining time for both sides, whole milliseconds, clamped at zero
/// before it ever reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    #[serde(rename = "wMs")]
    pub white_ms: u64,
    #[serde(rename = "bMs")]
    pub black_ms: u64,
}

/// Display names of the two seats, keyed by color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatNames {
    pub white: String,
    pub black: String,
}

/// Payload for MATCH_FOUND. The requester's copy carries the starting clock
/// snapshot; the copy pushed to the opponent omits it (the opponent receives
/// clocks with GAME_START).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFoundPayload {
    pub room: RoomId,
    pub players: SeatNames,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clocks: Option<ClockSnapshot>,
    #[serde(rename = "reconnectToken")]
    pub reconnect_token: String,
}

/// Payload for STATE_SYNC. `players` maps `"white"` / `"black"` to display
/// names and is empty when no game is attached to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSyncPayload {
    pub fen: String,
    pub turn: Color,
    pub clocks: ClockSnapshot,
    pub status: String,
    pub players: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_player: Option<Color>,
}

/// Payload for MOVE_APPLIED. The move itself is an opaque pass-through;
/// rule validation belongs to a separate engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAppliedPayload {
    #[serde(rename = "move")]
    pub game_move: serde_json::Value,
    pub fen: String,
    pub turn: Color,
    pub clocks: ClockSnapshot,
}

/// Payload for GAME_END.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEndPayload {
    pub winner: Color,
    pub reason: String,
    pub final_clocks: ClockSnapshot,
}

/// Payload for PLAYER_RECONNECTED. The reconnecting player's own copy carries
/// a fresh token and, for a running game, the live clock state; the copy
/// broadcast to the rest of the room carries neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectedPayload {
    pub room: RoomId,
    pub user: UserIdentity,
    #[serde(rename = "reconnectToken", skip_serializing_if = "Option::is_none")]
    pub reconnect_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clocks: Option<ClockSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_player: Option<Color>,
}

/// Placeholder board state until the rules engine owns position tracking.
pub const START_POSITION: &str = "startpos";

/// The only game status this server reports today.
pub const STATUS_PLAYING: &str = "PLAYING";
