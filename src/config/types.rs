//! Root configuration type.

use serde::{Deserialize, Serialize};

use super::auth::AuthConfig;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::session::SessionConfig;

/// Root configuration for gambit-server.
///
/// Unknown fields anywhere in the tree fail the load; a typo in an override
/// should surface at startup, not silently fall back to a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
