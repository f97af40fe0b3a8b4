//! HTTP and WebSocket surface.
//!
//! - handler: the `/ws` upgrade endpoint, including header pre-auth
//! - connection: per-socket reader/writer tasks and the auth deadline
//! - routes: router assembly, `/health` and `/metrics`, server startup

mod connection;
mod handler;
mod routes;

pub use handler::websocket_handler;
pub use routes::{create_router, run_server};
