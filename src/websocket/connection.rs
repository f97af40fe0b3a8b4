use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{CloseCode, RoomId, ServerMessage, UserIdentity};
use crate::server::{GameServer, Outbound, RegisterClientError};

/// Drive one WebSocket connection for its whole life.
///
/// The socket is split into a writer task that drains the connection's
/// outbound queue and a reader task that feeds inbound frames to the
/// dispatcher. Whichever half finishes first, the connection is unregistered
/// exactly once; the other half then winds down on its own when the transport
/// goes away.
pub(super) async fn handle_socket(
    socket: WebSocket,
    server: Arc<GameServer>,
    addr: SocketAddr,
    preauth: Option<UserIdentity>,
    room_hint: Option<RoomId>,
) {
    let (mut sink, mut stream) = socket.split();
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<Outbound>(server.config().server.outbound_queue);

    let register_span = tracing::info_span!(
        "connection.register",
        %connection_id,
        client_addr = %addr,
        preauthenticated = preauth.is_some()
    );
    // The guard must not be held across an await; registration is synchronous
    // and the spawned halves tag their own events with the connection id.
    let admitted = {
        let _span_guard = register_span.enter();
        let admitted = server.register_client(connection_id, tx, addr);
        if admitted.is_ok() {
            // A credential presented in the upgrade request skips the in-band
            // AUTH exchange entirely; otherwise a query-string room waits for
            // AUTH.
            match preauth {
                Some(identity) => {
                    server.complete_authentication(&connection_id, identity, room_hint);
                }
                None => {
                    if let Some(room) = room_hint {
                        server.set_room_hint(&connection_id, room);
                    }
                }
            }
        }
        admitted
    };
    if let Err(RegisterClientError::IpLimitExceeded { current, limit }) = admitted {
        tracing::warn!(client_addr = %addr, current, limit, "refusing connection over per-ip limit");
        let refusal = ServerMessage::error(format!("too many connections ({current}/{limit})"));
        if let Ok(frame) = serde_json::to_string(&refusal) {
            let _ = sink.send(Message::Text(frame.into())).await;
        }
        let _ = sink.close().await;
        return;
    }

    let write_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Message(message) => {
                    let frame = match serde_json::to_string(message.as_ref()) {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to serialize outbound frame");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(code) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: code.code(),
                            reason: code.reason().into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    let reader_server = server.clone();
    let auth_timeout = server.config().session.auth_timeout();
    let read_task = tokio::spawn(async move {
        let auth_deadline = tokio::time::sleep(auth_timeout);
        tokio::pin!(auth_deadline);
        let mut authenticated = reader_server.is_authenticated(&connection_id);

        loop {
            let incoming = if authenticated {
                match stream.next().await {
                    Some(incoming) => incoming,
                    None => break,
                }
            } else {
                tokio::select! {
                    incoming = stream.next() => match incoming {
                        Some(incoming) => incoming,
                        None => break,
                    },
                    () = &mut auth_deadline => {
                        tracing::warn!(%connection_id, timeout = ?auth_timeout, "no AUTH before the deadline, closing");
                        reader_server.metrics().increment_auth_timeouts();
                        reader_server.close_connection(&connection_id, CloseCode::AuthTimeout);
                        break;
                    }
                }
            };

            let message = match incoming {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(%connection_id, error = %err, "websocket read error");
                    break;
                }
            };

            match message {
                Message::Text(text) => {
                    reader_server.handle_text_frame(&connection_id, &text).await;
                    if !authenticated {
                        authenticated = reader_server.is_authenticated(&connection_id);
                    }
                }
                Message::Binary(_) => {
                    reader_server.send_error(&connection_id, "binary frames are not supported");
                }
                Message::Close(_) => {
                    tracing::debug!(%connection_id, "client closed the socket");
                    break;
                }
                // Axum answers pings itself; pongs need no bookkeeping here.
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = write_task => tracing::debug!(%connection_id, "writer finished"),
        _ = read_task => tracing::debug!(%connection_id, "reader finished"),
    }
    server.unregister_client(&connection_id);
}
