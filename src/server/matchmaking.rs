use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::RngExt;

use super::rooms::sanitize_room_id;
use crate::protocol::{ConnectionId, RoomId, SeatNames, UserIdentity};

/// One connection waiting to be paired.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    pub connection: ConnectionId,
    pub user: UserIdentity,
    pub enqueued_at: DateTime<Utc>,
}

impl WaitingEntry {
    pub fn new(connection: ConnectionId, user: UserIdentity) -> Self {
        Self {
            connection,
            user,
            enqueued_at: Utc::now(),
        }
    }
}

/// Result of an enqueue attempt.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// Nobody was waiting; the caller is now at the head of the queue.
    Queued,
    /// The caller was paired with the longest-waiting entry.
    Paired(Box<FormedMatch>),
}

/// A freshly formed pairing, colors already assigned.
#[derive(Debug, Clone)]
pub struct FormedMatch {
    pub room: RoomId,
    pub white: WaitingEntry,
    pub black: WaitingEntry,
}

impl FormedMatch {
    pub fn seat_names(&self) -> SeatNames {
        SeatNames {
            white: self.white.user.username.clone(),
            black: self.black.user.username.clone(),
        }
    }

    pub fn participants(&self) -> [&WaitingEntry; 2] {
        [&self.white, &self.black]
    }
}

/// FIFO pairing queue.
///
/// The entire enqueue-or-pair decision happens under one lock hold, so N
/// simultaneous requests from distinct connections always form exactly
/// `N / 2` matches with at most one entry left waiting. The critical section
/// is purely synchronous, hence the std mutex.
#[derive(Default)]
pub struct MatchmakingQueue {
    waiting: Mutex<VecDeque<WaitingEntry>>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `entry`, or pair it with the longest-waiting eligible entry.
    ///
    /// A connection that was already waiting is first removed, so repeated
    /// MATCHMAKE requests never produce duplicate entries. Entries carrying
    /// the same user id are never paired with each other: the two seats of
    /// a match must belong to distinct users. A caller-supplied `room` pins
    /// the formed match to that id instead of a generated one, which is how
    /// friendly "meet me in room X" pairings work.
    pub fn enqueue(&self, entry: WaitingEntry, room: Option<RoomId>) -> EnqueueOutcome {
        let mut waiting = self.lock();
        waiting.retain(|queued| queued.connection != entry.connection);

        let opponent = waiting
            .iter()
            .position(|queued| queued.user.id != entry.user.id)
            .and_then(|idx| waiting.remove(idx));
        match opponent {
            Some(opponent) => {
                let room = room.unwrap_or_else(|| {
                    generate_room_id(&opponent.user.username, &entry.user.username)
                });
                let (white, black) = assign_colors(opponent, entry);
                tracing::info!(
                    %room,
                    white = %white.user.username,
                    black = %black.user.username,
                    "matched two waiting players"
                );
                EnqueueOutcome::Paired(Box::new(FormedMatch { room, white, black }))
            }
            None => {
                waiting.push_back(entry);
                EnqueueOutcome::Queued
            }
        }
    }

    /// Purge the waiting entry for a disconnecting connection, if any.
    pub fn remove_connection(&self, connection: &ConnectionId) -> bool {
        let mut waiting = self.lock();
        let before = waiting.len();
        waiting.retain(|queued| queued.connection != *connection);
        waiting.len() != before
    }

    pub fn waiting_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<WaitingEntry>> {
        self.waiting
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Uniform random seat assignment, independent of queue order.
fn assign_colors(first: WaitingEntry, second: WaitingEntry) -> (WaitingEntry, WaitingEntry) {
    if rand::rng().random_bool(0.5) {
        (first, second)
    } else {
        (second, first)
    }
}

/// Synthesize a room id from the participants' names, a millisecond
/// timestamp, and a random suffix. Ids are never reused.
fn generate_room_id(first_name: &str, second_name: &str) -> RoomId {
    format!(
        "match_{}_{}_{}_{}",
        sanitize_room_id(first_name),
        sanitize_room_id(second_name),
        Utc::now().timestamp_millis(),
        random_suffix()
    )
}

fn random_suffix() -> String {
    const HEX_CHARS: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();
    (0..6)
        .map(|_| {
            let idx = rng.random_range(0..HEX_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = HEX_CHARS[idx] as char;
            ch
        })
        .collect()
}
