//! Collaborator seams for durable data the session core never owns.
//!
//! Finished-game records and user profiles live in the platform's data store,
//! not in this process. The core only needs two narrow operations, "persist
//! a finished game" and "look up a profile for display", expressed as traits
//! so the in-memory implementation used by development and tests can be
//! swapped for a real backend without touching the session logic.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::UserId;

/// How a recorded game concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameResult {
    Checkmate,
    Draw,
    Resigned,
    Timeout,
}

impl GameResult {
    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::Checkmate => "CHECKMATE",
            GameResult::Draw => "DRAW",
            GameResult::Resigned => "RESIGNED",
            GameResult::Timeout => "TIMEOUT",
        }
    }
}

/// One finished game, as handed to the results store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResultRecord {
    pub white_id: UserId,
    pub black_id: UserId,
    pub winner_id: Option<UserId>,
    pub loser_id: Option<UserId>,
    pub result: GameResult,
    #[serde(default)]
    pub vs_ai: bool,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl GameResultRecord {
    /// Consistency rules the platform enforces on game records: a draw names
    /// nobody, any decisive result names both sides, and every named id must
    /// be one of the two distinct participants.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.white_id == self.black_id {
            return Err(RecordError::DuplicatePlayers);
        }
        match self.result {
            GameResult::Draw => {
                if self.winner_id.is_some() || self.loser_id.is_some() {
                    return Err(RecordError::DrawNamesWinner);
                }
            }
            _ => {
                let (Some(winner), Some(loser)) = (self.winner_id, self.loser_id) else {
                    return Err(RecordError::MissingOutcome);
                };
                if winner == loser {
                    return Err(RecordError::WinnerIsLoser);
                }
                let participants = [self.white_id, self.black_id];
                if !participants.contains(&winner) || !participants.contains(&loser) {
                    return Err(RecordError::OutsideParticipant);
                }
            }
        }
        Ok(())
    }
}

/// Validation failures for a [`GameResultRecord`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("a game needs two distinct players")]
    DuplicatePlayers,
    #[error("a draw cannot name a winner or loser")]
    DrawNamesWinner,
    #[error("a decisive result requires both a winner and a loser")]
    MissingOutcome,
    #[error("winner and loser must be distinct")]
    WinnerIsLoser,
    #[error("winner and loser must be the game's participants")]
    OutsideParticipant,
}

/// Aggregate play statistics carried on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatistics {
    pub total_games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub elo_rating: u32,
}

impl Default for GameStatistics {
    fn default() -> Self {
        Self {
            total_games: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            elo_rating: 1200,
        }
    }
}

/// A user profile as the platform exposes it for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub statistics: GameStatistics,
}

impl Profile {
    /// Minimal profile used when only a name is known (test fixtures, the
    /// in-memory store).
    pub fn named(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            statistics: GameStatistics::default(),
        }
    }
}

/// Persists finished games.
#[async_trait]
pub trait GameResultStore: Send + Sync {
    async fn persist_game_result(&self, record: GameResultRecord) -> Result<()>;
}

/// Resolves user ids to display profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn lookup_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;
}

/// Process-local implementation of both stores. This is what development and
/// the test suite run against; nothing here survives a restart.
#[derive(Default)]
pub struct InMemoryStorage {
    results: std::sync::Mutex<Vec<GameResultRecord>>,
    profiles: DashMap<UserId, Profile>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id, profile);
    }

    /// Snapshot of everything persisted so far, oldest first.
    pub fn recorded_results(&self) -> Vec<GameResultRecord> {
        self.results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl GameResultStore for InMemoryStorage {
    async fn persist_game_result(&self, record: GameResultRecord) -> Result<()> {
        record.validate()?;
        self.results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStorage {
    async fn lookup_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.get(user_id).map(|entry| entry.clone()))
    }
}

/// Build the storage shared by all server services.
pub fn create_storage() -> Arc<InMemoryStorage> {
    Arc::new(InMemoryStorage::new())
}
