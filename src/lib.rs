#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Gambit Server
//!
//! An in-memory WebSocket session server for real-time chess matches.
//!
//! All state lives in the process: no database, no message broker. Run the
//! binary, point clients at `/ws`, and play.

/// Credential verification for the authentication gate
pub mod auth;

/// Server configuration: file, environment, defaults
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Single-use reconnect token management
pub mod reconnection;

/// Main server orchestration
pub mod server;

/// Game results and player profiles
pub mod storage;

/// WebSocket connection handling and HTTP routes
pub mod websocket;
