#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gambit_server::server::GameServer;
use gambit_server::{config, logging, websocket};

/// Gambit -- in-memory WebSocket session server for real-time chess matches
#[derive(Parser, Debug)]
#[command(name = "gambit-server")]
#[command(about = "An in-memory WebSocket session server for real-time chess matches")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file. Without it, $GAMBIT_CONFIG and then
    /// ./config.json are tried before falling back to built-in defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,

    /// Listen on this port instead of the configured one.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    // Handle --print-config: output the effective configuration as JSON
    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // load() already validated, so reaching this point means the config is
    // usable; --validate-config just reports and exits.
    if cli.validate_config {
        println!("Configuration validation passed");
        println!();
        println!("Configuration summary:");
        println!(
            "  Bind address: {}:{}",
            cfg.server.bind_addr, cfg.server.port
        );
        println!("  Auth tokens configured: {}", cfg.auth.tokens.len());
        println!("  Auth timeout: {}s", cfg.session.auth_timeout_secs);
        println!("  Initial clock: {}ms", cfg.session.initial_clock_ms);
        println!(
            "  Reconnect token TTL: {}s",
            cfg.session.reconnect_ttl_secs
        );
        println!(
            "  Max connections per IP: {}",
            cfg.server.max_connections_per_ip
        );
        return Ok(());
    }

    logging::init_with_config(&cfg.logging);

    let ip: IpAddr = cfg
        .server
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {e}", cfg.server.bind_addr))?;
    let addr = SocketAddr::new(ip, cfg.server.port);

    let server = Arc::new(GameServer::new(cfg));
    websocket::run_server(addr, server).await
}
