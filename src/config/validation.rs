//! Configuration validation.

use std::collections::HashSet;

use super::Config;

/// Reject configurations the server cannot meaningfully run with. Called by
/// the loader after all layers are merged; any error here aborts startup.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("server.port must not be 0");
    }
    if config.server.outbound_queue == 0 {
        anyhow::bail!("server.outbound_queue must be at least 1");
    }
    if config.session.auth_timeout_secs == 0 {
        anyhow::bail!("session.auth_timeout_secs must be at least 1");
    }
    if config.session.initial_clock_ms == 0 {
        anyhow::bail!("session.initial_clock_ms must be at least 1");
    }
    if config.session.reconnect_ttl_secs == 0 {
        anyhow::bail!("session.reconnect_ttl_secs must be at least 1");
    }
    if config.session.clock_stale_secs == 0 {
        anyhow::bail!("session.clock_stale_secs must be at least 1");
    }
    if config.session.maintenance_interval_secs == 0 {
        anyhow::bail!("session.maintenance_interval_secs must be at least 1");
    }

    let mut seen = HashSet::new();
    for entry in &config.auth.tokens {
        if entry.token.is_empty() {
            anyhow::bail!("auth.tokens contains an entry with an empty token");
        }
        if entry.username.is_empty() {
            anyhow::bail!("auth.tokens contains an entry with an empty username");
        }
        if !seen.insert(entry.token.as_str()) {
            anyhow::bail!("auth.tokens contains the same token twice");
        }
    }

    Ok(())
}
