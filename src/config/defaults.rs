//! Default value functions for configuration fields.
//!
//! Every `#[serde(default = ...)]` attribute in the configuration structs
//! points here, and the `Default` impls compose the same functions, so each
//! field's fallback is defined exactly once.

use super::logging::LogFormat;

// =============================================================================
// Server
// =============================================================================

pub fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

pub const fn default_port() -> u16 {
    8064
}

pub fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Bounded outbound queue per connection; a full queue drops frames rather
/// than back-pressuring room broadcasts.
pub const fn default_outbound_queue() -> usize {
    64
}

// =============================================================================
// Session
// =============================================================================

pub const fn default_auth_timeout_secs() -> u64 {
    5
}

pub const fn default_initial_clock_ms() -> u64 {
    300_000 // 5 minutes aside
}

pub const fn default_reconnect_ttl_secs() -> u64 {
    900 // 15 minutes
}

pub const fn default_clock_stale_secs() -> u64 {
    3600 // 1 hour
}

pub const fn default_maintenance_interval_secs() -> u64 {
    60
}

// =============================================================================
// Logging
// =============================================================================

pub fn default_log_filename() -> String {
    "gambit-server.log".to_string()
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
