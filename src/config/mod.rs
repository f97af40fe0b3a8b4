//! Configuration for gambit-server.
//!
//! Sources, highest precedence last applied:
//! JSON config file (`--config`, `GAMBIT_CONFIG`, or `./config.json`), then
//! `GAMBIT__SECTION__FIELD` environment overrides, all on top of compiled-in
//! defaults. The merged result is validated before the server starts.
//!
//! # Module structure
//!
//! - [`types`]: root [`Config`] struct
//! - [`server`]: listener address, CORS, admission limits
//! - [`session`]: auth window, clock parameters, maintenance timing
//! - [`auth`]: static token table for the in-memory verifier
//! - [`logging`]: level, format, optional rolling file output
//! - [`loader`]: file/env layering
//! - [`validation`]: post-load checks
//! - [`defaults`]: every serde default function

pub mod auth;
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod server;
pub mod session;
pub mod types;
pub mod validation;

pub use auth::{AccessTokenEntry, AuthConfig};
pub use loader::{load, CONFIG_PATH_ENV, ENV_OVERRIDE_PREFIX};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use server::ServerConfig;
pub use session::SessionConfig;
pub use types::Config;
pub use validation::validate;
