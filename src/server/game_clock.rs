use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use super::connection_registry::ConnectionRegistry;
use super::rooms::RoomDirectory;
use crate::protocol::{
    ClockSnapshot, Color, GameEndPayload, MoveAppliedPayload, RoomId, ServerMessage,
    StateSyncPayload, UserId, START_POSITION, STATUS_PLAYING,
};

/// One seat of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatAssignment {
    pub user_id: UserId,
    pub username: String,
}

/// Authoritative countdown clock and turn state for one room.
///
/// Lives `NOT_STARTED` (no last-update timestamp) until both players confirm
/// readiness, then `RUNNING` until the game ends, at which point the whole
/// entry is discarded.
#[derive(Debug)]
pub struct GameClock {
    pub white: SeatAssignment,
    pub black: SeatAssignment,
    pub white_ms: u64,
    pub black_ms: u64,
    /// Side to move. Unset until the game starts.
    pub active: Option<Color>,
    /// When the active side's clock last started counting. Unset until the
    /// game starts.
    pub last_update: Option<Instant>,
    /// User ids that confirmed readiness.
    pub ready: HashSet<UserId>,
    /// Last transition of any kind, consulted by the staleness sweep.
    last_touch: Instant,
}

impl GameClock {
    fn new(white: SeatAssignment, black: SeatAssignment, initial_ms: u64) -> Self {
        Self {
            white,
            black,
            white_ms: initial_ms,
            black_ms: initial_ms,
            active: None,
            last_update: None,
            ready: HashSet::new(),
            last_touch: Instant::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.last_update.is_some()
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            white_ms: self.white_ms,
            black_ms: self.black_ms,
        }
    }

    pub fn seat(&self, color: Color) -> &SeatAssignment {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// Which side `user_id` plays, if they are seated at all.
    pub fn seat_of(&self, user_id: &UserId) -> Option<Color> {
        if self.white.user_id == *user_id {
            Some(Color::White)
        } else if self.black.user_id == *user_id {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Snapshot served to STATE_REQUEST and on room rejoin.
    pub fn state_payload(&self) -> StateSyncPayload {
        let mut players = BTreeMap::new();
        players.insert("white".to_string(), self.white.username.clone());
        players.insert("black".to_string(), self.black.username.clone());
        StateSyncPayload {
            fen: START_POSITION.to_string(),
            turn: self.active.unwrap_or(Color::White),
            clocks: self.snapshot(),
            status: STATUS_PLAYING.to_string(),
            players,
            active_player: self.active,
        }
    }

    fn touch(&mut self) {
        self.last_touch = Instant::now();
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Readiness recorded (or repeated); the caller alone gets READY_CONFIRMED.
    Confirmed,
    /// Second distinct user confirmed; the game is now running and GAME_START
    /// has been broadcast to the room.
    Started,
    NoClock,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Applied,
    NotRunning,
    NotYourTurn,
    NoClock,
}

#[derive(Debug)]
pub enum ResignOutcome {
    Ended(Box<FinishedGame>),
    NotParticipant,
    NoClock,
}

/// What remains of a game after its clock has been discarded, for result
/// persistence.
#[derive(Debug, Clone)]
pub struct FinishedGame {
    pub room: RoomId,
    pub winner: Color,
    pub white: SeatAssignment,
    pub black: SeatAssignment,
    pub final_clocks: ClockSnapshot,
}

impl FinishedGame {
    pub fn winner_seat(&self) -> &SeatAssignment {
        match self.winner {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn loser_seat(&self) -> &SeatAssignment {
        match self.winner {
            Color::White => &self.black,
            Color::Black => &self.white,
        }
    }
}

/// Per-room clocks, keyed by room id.
///
/// Every transition is computed and broadcast while holding the entry's map
/// guard, so for any one room the broadcasts observed by members follow the
/// order the transitions were applied. Never call into this service while
/// holding a room or registry guard.
pub struct GameClockService {
    clocks: DashMap<RoomId, GameClock>,
    initial_ms: u64,
    stale_after: Duration,
}

impl GameClockService {
    pub fn new(initial_ms: u64, stale_after: Duration) -> Self {
        Self {
            clocks: DashMap::new(),
            initial_ms,
            stale_after,
        }
    }

    /// Attach a fresh, unstarted clock to `room`. Returns the starting
    /// snapshot for the requester's MATCH_FOUND payload.
    pub fn create_for_match(
        &self,
        room: RoomId,
        white: SeatAssignment,
        black: SeatAssignment,
    ) -> ClockSnapshot {
        let clock = GameClock::new(white, black, self.initial_ms);
        let snapshot = clock.snapshot();
        self.clocks.insert(room, clock);
        snapshot
    }

    /// Record `user_id` as ready; the second distinct user starts the game.
    pub fn mark_ready(
        &self,
        room: &RoomId,
        user_id: UserId,
        rooms: &RoomDirectory,
        registry: &ConnectionRegistry,
    ) -> ReadyOutcome {
        let Some(mut clock) = self.clocks.get_mut(room) else {
            return ReadyOutcome::NoClock;
        };
        clock.touch();
        if clock.is_running() {
            return ReadyOutcome::Confirmed;
        }

        clock.ready.insert(user_id);
        if clock.ready.len() < 2 {
            return ReadyOutcome::Confirmed;
        }

        clock.active = Some(Color::White);
        clock.last_update = Some(Instant::now());
        let message = Arc::new(ServerMessage::GameStart {
            room: room.clone(),
            clocks: clock.snapshot(),
        });
        // Broadcast before releasing the entry guard so room members observe
        // transitions in application order.
        rooms.broadcast(room, message, registry);
        tracing::info!(%room, "game started");
        ReadyOutcome::Started
    }

    /// Apply a move: deduct elapsed time from the mover, flip the turn, and
    /// broadcast the new state. The move payload passes through opaquely.
    pub fn apply_move(
        &self,
        room: &RoomId,
        user_id: &UserId,
        game_move: serde_json::Value,
        rooms: &RoomDirectory,
        registry: &ConnectionRegistry,
    ) -> MoveOutcome {
        let Some(mut clock) = self.clocks.get_mut(room) else {
            return MoveOutcome::NoClock;
        };
        let (Some(active), Some(last_update)) = (clock.active, clock.last_update) else {
            return MoveOutcome::NotRunning;
        };
        if clock.seat(active).user_id != *user_id {
            return MoveOutcome::NotYourTurn;
        }

        let now = Instant::now();
        let elapsed = elapsed_ms(last_update, now);
        match active {
            Color::White => clock.white_ms = clock.white_ms.saturating_sub(elapsed),
            Color::Black => clock.black_ms = clock.black_ms.saturating_sub(elapsed),
        }
        let next = active.opposite();
        clock.active = Some(next);
        clock.last_update = Some(now);
        clock.touch();

        let message = Arc::new(ServerMessage::MoveApplied {
            payload: MoveAppliedPayload {
                game_move,
                fen: START_POSITION.to_string(),
                turn: next,
                clocks: clock.snapshot(),
            },
        });
        rooms.broadcast(room, message, registry);
        MoveOutcome::Applied
    }

    /// Concede: the other seat wins, GAME_END is broadcast, and the clock is
    /// discarded. Valid whenever a clock exists, started or not.
    pub fn resign(
        &self,
        room: &RoomId,
        user_id: &UserId,
        rooms: &RoomDirectory,
        registry: &ConnectionRegistry,
    ) -> ResignOutcome {
        match self.clocks.entry(room.clone()) {
            Entry::Vacant(_) => ResignOutcome::NoClock,
            Entry::Occupied(occupied) => {
                let Some(loser) = occupied.get().seat_of(user_id) else {
                    return ResignOutcome::NotParticipant;
                };
                let winner = loser.opposite();
                let final_clocks = occupied.get().snapshot();

                let message = Arc::new(ServerMessage::GameEnd {
                    payload: GameEndPayload {
                        winner,
                        reason: "resignation".to_string(),
                        final_clocks,
                    },
                });
                rooms.broadcast(room, message, registry);

                let clock = occupied.remove();
                tracing::info!(%room, winner = %winner, "game ended by resignation");
                ResignOutcome::Ended(Box::new(FinishedGame {
                    room: room.clone(),
                    winner,
                    white: clock.white,
                    black: clock.black,
                    final_clocks,
                }))
            }
        }
    }

    /// Handle a participant disconnect for an unstarted game. The user's
    /// readiness is withdrawn; once nobody is ready the room counts as
    /// abandoned and the clock is dropped. A running game is untouched; the
    /// player may come back with a reconnect token.
    pub fn handle_disconnect(&self, room: &RoomId, user_id: &UserId) -> bool {
        match self.clocks.entry(room.clone()) {
            Entry::Vacant(_) => false,
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_running() {
                    return false;
                }
                occupied.get_mut().ready.remove(user_id);
                if occupied.get().ready.is_empty() {
                    occupied.remove();
                    tracing::debug!(%room, "discarded unstarted clock for abandoned room");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn state_payload(&self, room: &RoomId) -> Option<StateSyncPayload> {
        self.clocks.get(room).map(|clock| clock.state_payload())
    }

    pub fn clock_snapshot(&self, room: &RoomId) -> Option<ClockSnapshot> {
        self.clocks.get(room).map(|clock| clock.snapshot())
    }

    /// Both seat assignments for `room`, white first.
    pub fn seats(&self, room: &RoomId) -> Option<(SeatAssignment, SeatAssignment)> {
        self.clocks.get(room).map(|clock| {
            (
                clock.seat(Color::White).clone(),
                clock.seat(Color::Black).clone(),
            )
        })
    }

    /// Clock snapshot plus the color to move, present only while running.
    pub fn running_state(&self, room: &RoomId) -> Option<(ClockSnapshot, Color)> {
        let clock = self.clocks.get(room)?;
        let active = clock.active?;
        Some((clock.snapshot(), active))
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.clocks.contains_key(room)
    }

    pub fn active_count(&self) -> usize {
        self.clocks.len()
    }

    /// Drop clocks with no transition for longer than the staleness window.
    pub fn sweep_stale(&self) -> usize {
        let before = self.clocks.len();
        self.clocks
            .retain(|_, clock| clock.last_touch.elapsed() < self.stale_after);
        let removed = before.saturating_sub(self.clocks.len());
        if removed > 0 {
            tracing::info!(count = removed, "swept stale game clocks");
        }
        removed
    }
}

fn elapsed_ms(from: Instant, to: Instant) -> u64 {
    u64::try_from(to.saturating_duration_since(from).as_millis()).unwrap_or(u64::MAX)
}
