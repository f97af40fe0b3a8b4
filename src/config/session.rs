//! Session lifecycle configuration: the authentication window, game clock
//! parameters, and maintenance timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_auth_timeout_secs, default_clock_stale_secs, default_initial_clock_ms,
    default_maintenance_interval_secs, default_reconnect_ttl_secs,
};

/// The `[session]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// How long an unauthenticated connection may idle before it is closed.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Starting time per side, in milliseconds.
    #[serde(default = "default_initial_clock_ms")]
    pub initial_clock_ms: u64,
    /// How long an unredeemed reconnect token stays valid.
    #[serde(default = "default_reconnect_ttl_secs")]
    pub reconnect_ttl_secs: u64,
    /// Clocks untouched for this long are discarded by the maintenance sweep.
    #[serde(default = "default_clock_stale_secs")]
    pub clock_stale_secs: u64,
    /// Interval between maintenance sweeps.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

impl SessionConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn clock_stale_after(&self) -> Duration {
        Duration::from_secs(self.clock_stale_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_timeout_secs: default_auth_timeout_secs(),
            initial_clock_ms: default_initial_clock_ms(),
            reconnect_ttl_secs: default_reconnect_ttl_secs(),
            clock_stale_secs: default_clock_stale_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}
