use thiserror::Error;

/// Authentication errors surfaced by credential verification.
///
/// The display strings double as the ERROR payload text sent to the client
/// before the connection is closed, so changing them is a wire-visible change.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no token provided")]
    MissingToken,
    #[error("invalid token payload")]
    InvalidToken,
    /// Reserved for verifier backends that can accept a credential but fail
    /// to resolve the account behind it (e.g. a deactivated user). The
    /// in-memory verifier never returns it, but gate handling is in place so
    /// client error paths stay stable when such a backend lands.
    #[error("identity could not be resolved")]
    UnresolvedIdentity,
}
