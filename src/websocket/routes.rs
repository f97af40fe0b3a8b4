use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::MetricsSnapshot;
use crate::server::GameServer;

use super::handler::websocket_handler;

/// Build the Axum router: the WebSocket endpoint plus the two plain HTTP
/// routes operators poll.
pub fn create_router(cors_origins: &[String]) -> axum::Router<Arc<GameServer>> {
    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect();
    if parsed.is_empty() {
        tracing::warn!("no valid cors origins configured, using permissive cors");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler(State(server): State<Arc<GameServer>>) -> Json<MetricsSnapshot> {
    Json(server.metrics_snapshot())
}

/// Bind the listener, start the maintenance sweep, and serve until the
/// process is stopped.
pub async fn run_server(addr: SocketAddr, server: Arc<GameServer>) -> anyhow::Result<()> {
    let maintenance = server.clone();
    tokio::spawn(async move {
        maintenance.maintenance_task().await;
    });

    let app = create_router(&server.config().server.cors_origins).with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "session server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
