// Protocol module: wire messages, shared payload types, and close codes

pub mod close_codes;
pub mod messages;
pub mod types;

pub use close_codes::CloseCode;
pub use messages::{parse_client_message, ClientMessage, FrameError, ServerMessage};
pub use types::{
    ClockSnapshot, Color, ConnectionId, GameEndPayload, MatchFoundPayload, MoveAppliedPayload,
    ReconnectedPayload, RoomId, SeatNames, StateSyncPayload, UserId, UserIdentity,
    START_POSITION, STATUS_PLAYING,
};
