//! Server listener and admission configuration.

use super::defaults::{
    default_bind_addr, default_cors_origins, default_outbound_queue, default_port,
};
use serde::{Deserialize, Serialize};

/// The `[server]` config section: where to listen and how connections are
/// admitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by the CORS layer. An empty list allows any origin
    /// (development convenience, not a recommended production setting).
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Concurrent connections allowed per client address. 0 disables the cap.
    #[serde(default)]
    pub max_connections_per_ip: usize,
    /// Capacity of each connection's outbound frame queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            max_connections_per_ip: 0,
            outbound_queue: default_outbound_queue(),
        }
    }
}
