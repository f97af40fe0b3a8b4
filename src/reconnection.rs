//! Reconnect token lifecycle.
//!
//! When a match is formed (and again whenever a player successfully resumes)
//! each participant receives an opaque token that lets a later connection
//! re-enter the room without repeating the credential handshake. Tokens are
//! single-use: a successful resume consumes the token and a fresh one is
//! issued in its place.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use getrandom::fill as fill_random;
use thiserror::Error;

use crate::protocol::{RoomId, UserId};

/// Raw entropy per token. 32 bytes encodes to 43 URL-safe characters.
const TOKEN_BYTES: usize = 32;

/// Why a `RECONNECT` could not be honored. Display strings double as the
/// ERROR text sent back to the client.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectError {
    #[error("unknown reconnect token")]
    Unknown,
    #[error("reconnect token expired")]
    Expired,
    #[error("reconnect token belongs to another user")]
    Mismatch,
    #[error("token generation failed")]
    EntropyUnavailable,
}

/// What a live token entitles its holder to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub room: RoomId,
    /// The user the token was minted for. `None` leaves the token bearer-only.
    pub expected_user: Option<UserId>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Single-use reconnect tokens with a fixed time-to-live.
pub struct ReconnectTokenStore {
    tokens: DashMap<String, IssuedToken>,
    ttl: Duration,
}

impl ReconnectTokenStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Mint a fresh token for `expected_user` in `room`.
    pub fn mint(
        &self,
        room: RoomId,
        expected_user: Option<UserId>,
    ) -> Result<String, ReconnectError> {
        let token = generate_token()?;
        let now = Utc::now();
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                room,
                expected_user,
                issued_at: now,
                expires_at: now + self.ttl,
            },
        );
        Ok(token)
    }

    /// Redeem `token` on behalf of `presenter`.
    ///
    /// Exactly one concurrent caller can win a given token: the entry is
    /// removed under the map's shard lock before this returns `Ok`. An
    /// expired token is dropped on sight. A token presented by the wrong
    /// user stays in place so its rightful holder can still redeem it.
    pub fn consume(
        &self,
        token: &str,
        presenter: Option<&UserId>,
    ) -> Result<IssuedToken, ReconnectError> {
        match self.tokens.entry(token.to_owned()) {
            Entry::Vacant(_) => Err(ReconnectError::Unknown),
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired() {
                    occupied.remove();
                    return Err(ReconnectError::Expired);
                }
                if let (Some(expected), Some(presenter)) =
                    (occupied.get().expected_user, presenter)
                {
                    if expected != *presenter {
                        return Err(ReconnectError::Mismatch);
                    }
                }
                Ok(occupied.remove())
            }
        }
    }

    /// Drop every expired token. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, issued| !issued.is_expired());
        let removed = before.saturating_sub(self.tokens.len());
        if removed > 0 {
            tracing::info!(count = removed, "removed expired reconnect tokens");
        }
        removed
    }

    /// Number of unredeemed tokens currently held.
    pub fn pending(&self) -> usize {
        self.tokens.len()
    }
}

fn generate_token() -> Result<String, ReconnectError> {
    let mut raw = [0u8; TOKEN_BYTES];
    fill_random(&mut raw).map_err(|_| ReconnectError::EntropyUnavailable)?;
    Ok(URL_SAFE_NO_PAD.encode(raw))
}
