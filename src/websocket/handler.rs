use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::auth::bearer_token;
use crate::protocol::RoomId;
use crate::server::{sanitize_room_id, GameServer};

use super::connection::handle_socket;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Room to join as soon as the connection authenticates.
    pub room: Option<RoomId>,
}

/// WebSocket upgrade endpoint.
///
/// A `Bearer` credential in the `Authorization` header authenticates the
/// connection before the first frame; an invalid header is not fatal, the
/// client just has to AUTH in-band like everyone else.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<GameServer>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> Response {
    let header_token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);

    let preauth = match header_token {
        Some(token) => match server.verifier().verify_credential(&token).await {
            Ok(identity) => Some(identity),
            Err(err) => {
                tracing::debug!(
                    client_addr = %addr,
                    error = %err,
                    "header credential rejected, deferring to in-band auth"
                );
                None
            }
        },
        None => None,
    };
    let room_hint = query
        .room
        .filter(|room| !room.is_empty())
        .map(|room| sanitize_room_id(&room));

    ws.on_upgrade(move |socket| handle_socket(socket, server, addr, preauth, room_hint))
}
