//! Static credential table for the in-memory verifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One acceptable bearer token and the identity it resolves to.
///
/// `user_id` may be omitted in config files; the verifier then derives a
/// stable id from the username so that restarts keep identities consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessTokenEntry {
    pub token: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub username: String,
}

/// The `[auth]` config section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Accepted tokens. An empty table rejects every credential; deployments
    /// with real accounts swap in a verifier backed by the platform's session
    /// service instead of filling this in.
    #[serde(default)]
    pub tokens: Vec<AccessTokenEntry>,
}
