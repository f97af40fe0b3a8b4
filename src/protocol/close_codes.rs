/// Abnormal WebSocket close codes sent when the authentication gate gives up
/// on a connection.
///
/// The numeric values are a stable contract with client implementers (the
/// 4000-4999 range is reserved for application use by RFC 6455): clients key
/// their retry/re-login behavior off these exact codes, so they must never be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// No AUTH message arrived within the handshake window.
    AuthTimeout,
    /// An AUTH message arrived but carried no token.
    MissingToken,
    /// The credential was rejected or resolved to no usable identity.
    AuthFailed,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        match self {
            CloseCode::AuthTimeout => 4001,
            CloseCode::MissingToken => 4002,
            CloseCode::AuthFailed => 4003,
        }
    }

    /// Short human-readable reason carried in the close frame.
    pub fn reason(self) -> &'static str {
        match self {
            CloseCode::AuthTimeout => "authentication timeout",
            CloseCode::MissingToken => "no token provided",
            CloseCode::AuthFailed => "authentication failed",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.reason())
    }
}
