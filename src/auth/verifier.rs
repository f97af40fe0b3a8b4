//! Credential verification for gambit-server.
//!
//! The server never stores accounts or mints login credentials; it only needs
//! "turn this opaque bearer token into a user identity". That seam is the
//! [`CredentialVerifier`] trait. The in-memory implementation validates
//! tokens against a static table loaded at startup, which is what local
//! development and the test suite run against.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::error::AuthError;
use crate::config::AccessTokenEntry;
use crate::protocol::UserIdentity;

/// Resolves a short-lived access token to the identity behind it.
///
/// Async so that backends doing real I/O (a session service, a JWT key
/// fetch) can slot in without changing call sites.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_credential(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Derive a deterministic UUID from a string key using SHA-256. The first 16
/// bytes of the hash are used as the UUID value with the version nibble set
/// to 4 (random) and the variant to RFC 4122.
fn deterministic_uuid(key: &str) -> Uuid {
    let hash = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    // Set version to 4 (bits 48..51)
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    // Set variant to RFC 4122 (bits 64..65)
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Uuid::from_bytes(bytes)
}

/// Constant-time secret comparison to prevent timing attacks.
fn secrets_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Extract the credential from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// In-memory verifier backed by the `[auth]` config section.
///
/// Tokens are compared in constant time against every configured entry
/// rather than hashed into a map, so a probe learns nothing about how close
/// its guess was. The table is small (it exists for development and tests,
/// not production credential volumes).
pub struct StaticTokenVerifier {
    entries: Vec<(String, UserIdentity)>,
}

impl StaticTokenVerifier {
    pub fn new(entries: Vec<AccessTokenEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let id = entry
                    .user_id
                    .unwrap_or_else(|| deterministic_uuid(&entry.username));
                let identity = UserIdentity {
                    id,
                    username: entry.username,
                };
                (entry.token, identity)
            })
            .collect();
        Self { entries }
    }
}

#[async_trait]
impl CredentialVerifier for StaticTokenVerifier {
    async fn verify_credential(&self, token: &str) -> Result<UserIdentity, AuthError> {
        // Scan the whole table unconditionally; no early exit on match.
        let mut resolved: Option<&UserIdentity> = None;
        for (expected, identity) in &self.entries {
            if secrets_match(expected, token) {
                resolved = Some(identity);
            }
        }
        resolved.cloned().ok_or(AuthError::InvalidToken)
    }
}
