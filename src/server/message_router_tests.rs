use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::StaticTokenVerifier;
use crate::config::{AccessTokenEntry, Config};
use crate::protocol::{
    ClockSnapshot, Color, ConnectionId, MatchFoundPayload, RoomId, ServerMessage,
};
use crate::storage::{create_storage, GameResult, InMemoryStorage, Profile};

use super::{GameServer, Outbound};

fn ada_id() -> Uuid {
    Uuid::from_u128(0xA)
}

fn bert_id() -> Uuid {
    Uuid::from_u128(0xB)
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.tokens = vec![
        AccessTokenEntry {
            token: "token-ada".to_string(),
            user_id: Some(ada_id()),
            username: "ada".to_string(),
        },
        AccessTokenEntry {
            token: "token-bert".to_string(),
            user_id: Some(bert_id()),
            username: "bert".to_string(),
        },
        AccessTokenEntry {
            token: "token-cleo".to_string(),
            user_id: Some(Uuid::from_u128(0xC)),
            username: "cleo".to_string(),
        },
    ];
    config
}

fn server_with_storage() -> (GameServer, Arc<InMemoryStorage>) {
    let config = test_config();
    let storage = create_storage();
    let verifier = Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone()));
    let server = GameServer::with_collaborators(config, verifier, storage.clone(), storage.clone());
    (server, storage)
}

fn test_server() -> GameServer {
    server_with_storage().0
}

/// Pull everything currently queued for a connection, dropping close frames.
fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        if let Outbound::Message(message) = outbound {
            messages.push((*message).clone());
        }
    }
    messages
}

/// Like [`drain`], but keeps close frames so tests can assert on codes.
fn drain_raw(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
    let mut frames = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        frames.push(outbound);
    }
    frames
}

fn error_texts(frames: &[ServerMessage]) -> Vec<&str> {
    frames
        .iter()
        .filter_map(|message| match message {
            ServerMessage::Error { message } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

fn match_payload(frames: &[ServerMessage]) -> MatchFoundPayload {
    frames
        .iter()
        .find_map(|message| match message {
            ServerMessage::MatchFound { payload } => Some(payload.clone()),
            _ => None,
        })
        .expect("MATCH_FOUND delivered")
}

async fn connect_and_auth(
    server: &GameServer,
    token: &str,
) -> (ConnectionId, mpsc::Receiver<Outbound>) {
    let (connection, mut rx) = server.connect_client();
    server
        .handle_text_frame(&connection, &format!(r#"{{"type":"AUTH","token":"{token}"}}"#))
        .await;
    let frames = drain(&mut rx);
    assert!(
        matches!(frames.as_slice(), [ServerMessage::AuthOk]),
        "expected AUTH_OK, got {frames:?}"
    );
    (connection, rx)
}

struct PlayerHandle {
    connection: ConnectionId,
    rx: mpsc::Receiver<Outbound>,
    token: String,
    user_id: Uuid,
    username: &'static str,
}

/// Authenticate ada and bert, pair them via MATCHMAKE, and hand back
/// seat-ordered handles, white first.
async fn pair_players(server: &GameServer) -> (RoomId, PlayerHandle, PlayerHandle) {
    let (ada, mut ada_rx) = connect_and_auth(server, "token-ada").await;
    let (bert, mut bert_rx) = connect_and_auth(server, "token-bert").await;
    drain(&mut ada_rx); // bert's presence announcement

    server
        .handle_text_frame(&ada, r#"{"type":"MATCHMAKE"}"#)
        .await;
    drain(&mut ada_rx); // MATCH_QUEUED
    server
        .handle_text_frame(&bert, r#"{"type":"MATCHMAKE"}"#)
        .await;

    let ada_payload = match_payload(&drain(&mut ada_rx));
    let bert_payload = match_payload(&drain(&mut bert_rx));
    let room = ada_payload.room.clone();

    let ada_handle = PlayerHandle {
        connection: ada,
        rx: ada_rx,
        token: ada_payload.reconnect_token.clone(),
        user_id: ada_id(),
        username: "ada",
    };
    let bert_handle = PlayerHandle {
        connection: bert,
        rx: bert_rx,
        token: bert_payload.reconnect_token.clone(),
        user_id: bert_id(),
        username: "bert",
    };
    if ada_payload.players.white == "ada" {
        (room, ada_handle, bert_handle)
    } else {
        (room, bert_handle, ada_handle)
    }
}

async fn start_game(server: &GameServer, white: &mut PlayerHandle, black: &mut PlayerHandle) {
    server
        .handle_text_frame(&white.connection, r#"{"type":"READY"}"#)
        .await;
    drain(&mut white.rx);
    server
        .handle_text_frame(&black.connection, r#"{"type":"READY"}"#)
        .await;
    let frames = drain(&mut black.rx);
    assert!(
        frames
            .iter()
            .any(|message| matches!(message, ServerMessage::GameStart { .. })),
        "expected GAME_START, got {frames:?}"
    );
    drain(&mut white.rx);
}

#[tokio::test]
async fn nothing_but_auth_passes_the_gate() {
    let server = test_server();
    let (connection, mut rx) = server.connect_client();

    for frame in [
        r#"{"type":"PING"}"#,
        r#"{"type":"MATCHMAKE"}"#,
        r#"{"type":"NONSENSE"}"#,
        "not even json",
    ] {
        server.handle_text_frame(&connection, frame).await;
    }

    let frames = drain_raw(&mut rx);
    assert_eq!(frames.len(), 4);
    for frame in &frames {
        let Outbound::Message(message) = frame else {
            panic!("gate must not close the connection, got {frame:?}");
        };
        assert_eq!(
            error_texts(std::slice::from_ref(message.as_ref())),
            ["auth required"]
        );
    }
    assert!(!server.is_authenticated(&connection));
}

#[tokio::test]
async fn auth_binds_identity_and_announces_presence() {
    let server = test_server();

    let (ada, mut ada_rx) = connect_and_auth(&server, "token-ada").await;
    assert!(server.is_authenticated(&ada));
    assert_eq!(server.online_count(), 1);

    let (_bert, _bert_rx) = connect_and_auth(&server, "token-bert").await;
    let frames = drain(&mut ada_rx);
    assert!(
        frames.iter().any(|message| matches!(
            message,
            ServerMessage::PlayerJoined { user } if user.username == "bert"
        )),
        "ada should hear about bert, got {frames:?}"
    );
    assert_eq!(server.online_count(), 2);
}

#[tokio::test]
async fn auth_can_seat_the_connection_in_a_room() {
    let server = test_server();
    let (connection, mut rx) = server.connect_client();

    server
        .handle_text_frame(
            &connection,
            r#"{"type":"AUTH","token":"token-ada","room":"lobby_7"}"#,
        )
        .await;

    let frames = drain(&mut rx);
    assert!(matches!(frames.as_slice(), [ServerMessage::AuthOk]));
    assert_eq!(server.rooms.occupancy(&"lobby_7".to_string()), 1);
}

#[tokio::test]
async fn missing_and_invalid_tokens_close_with_distinct_codes() {
    let server = test_server();

    let (no_token, mut no_token_rx) = server.connect_client();
    server
        .handle_text_frame(&no_token, r#"{"type":"AUTH"}"#)
        .await;
    let frames = drain_raw(&mut no_token_rx);
    assert!(matches!(
        frames.as_slice(),
        [Outbound::Message(message), Outbound::Close(code)]
            if matches!(message.as_ref(), ServerMessage::Error { message } if message == "no token provided")
                && code.code() == 4002
    ));

    let (bad_token, mut bad_token_rx) = server.connect_client();
    server
        .handle_text_frame(&bad_token, r#"{"type":"AUTH","token":"token-eve"}"#)
        .await;
    let frames = drain_raw(&mut bad_token_rx);
    assert!(matches!(
        frames.as_slice(),
        [Outbound::Message(message), Outbound::Close(code)]
            if matches!(message.as_ref(), ServerMessage::Error { message } if message == "invalid token payload")
                && code.code() == 4003
    ));

    let snapshot = server.metrics_snapshot();
    assert_eq!(snapshot.auth_failures, 2);
    assert_eq!(snapshot.auth_successes, 0);
}

#[tokio::test]
async fn a_second_auth_is_a_protocol_error() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    server
        .handle_text_frame(&connection, r#"{"type":"AUTH","token":"token-ada"}"#)
        .await;

    let frames = drain_raw(&mut rx);
    assert_eq!(frames.len(), 1, "no close frame expected, got {frames:?}");
    let Outbound::Message(message) = &frames[0] else {
        panic!("expected an error frame, got {frames:?}");
    };
    assert_eq!(
        error_texts(std::slice::from_ref(message.as_ref())),
        ["already authenticated"]
    );
    assert!(server.is_authenticated(&connection));
}

#[tokio::test]
async fn matchmake_queues_then_pairs() {
    let server = test_server();
    let (ada, mut ada_rx) = connect_and_auth(&server, "token-ada").await;
    let (bert, mut bert_rx) = connect_and_auth(&server, "token-bert").await;
    drain(&mut ada_rx);

    server
        .handle_text_frame(&ada, r#"{"type":"MATCHMAKE"}"#)
        .await;
    let queued = drain(&mut ada_rx);
    assert!(matches!(queued.as_slice(), [ServerMessage::MatchQueued]));
    assert_eq!(server.waiting_count(), 1);

    server
        .handle_text_frame(&bert, r#"{"type":"MATCHMAKE"}"#)
        .await;
    let ada_frames = drain(&mut ada_rx);
    let bert_frames = drain(&mut bert_rx);

    let ada_payload = match_payload(&ada_frames);
    let bert_payload = match_payload(&bert_frames);
    assert_eq!(ada_payload.room, bert_payload.room);
    assert_eq!(ada_payload.players, bert_payload.players);
    let seats = [
        ada_payload.players.white.as_str(),
        ada_payload.players.black.as_str(),
    ];
    assert!(seats.contains(&"ada") && seats.contains(&"bert"));

    // The pairing requester gets the starting clocks, the queued side does
    // not, and each side gets its own reconnect token.
    assert!(ada_payload.clocks.is_none());
    assert_eq!(
        bert_payload.clocks,
        Some(ClockSnapshot {
            white_ms: 300_000,
            black_ms: 300_000,
        })
    );
    assert_ne!(ada_payload.reconnect_token, bert_payload.reconnect_token);

    for frames in [&ada_frames, &bert_frames] {
        assert!(
            frames.iter().any(|message| matches!(
                message,
                ServerMessage::GameReady { room, .. } if *room == ada_payload.room
            )),
            "both members should see GAME_READY, got {frames:?}"
        );
    }

    assert_eq!(server.waiting_count(), 0);
    assert_eq!(server.active_games(), 1);
    assert_eq!(server.rooms.occupancy(&ada_payload.room), 2);

    let snapshot = server.metrics_snapshot();
    assert_eq!(snapshot.matchmaking_requests, 2);
    assert_eq!(snapshot.matches_formed, 1);
    assert_eq!(snapshot.reconnect_tokens_issued, 2);
}

#[tokio::test]
async fn matchmake_honors_a_requested_room_name() {
    let server = test_server();
    let (ada, mut ada_rx) = connect_and_auth(&server, "token-ada").await;
    let (bert, mut bert_rx) = connect_and_auth(&server, "token-bert").await;
    drain(&mut ada_rx);

    server
        .handle_text_frame(&ada, r#"{"type":"MATCHMAKE"}"#)
        .await;
    drain(&mut ada_rx);
    server
        .handle_text_frame(&bert, r#"{"type":"MATCHMAKE","room":"friendly_9"}"#)
        .await;

    assert_eq!(match_payload(&drain(&mut ada_rx)).room, "friendly_9");
    assert_eq!(match_payload(&drain(&mut bert_rx)).room, "friendly_9");
}

#[tokio::test]
async fn a_game_runs_from_matchmake_to_resignation() {
    let (server, storage) = server_with_storage();
    let (_room, mut white, mut black) = pair_players(&server).await;
    start_game(&server, &mut white, &mut black).await;

    server
        .handle_text_frame(
            &white.connection,
            r#"{"type":"MOVE_SUBMIT","move":{"from":"d2","to":"d4"}}"#,
        )
        .await;
    let frames = drain(&mut black.rx);
    let applied = frames
        .iter()
        .find_map(|message| match message {
            ServerMessage::MoveApplied { payload } => Some(payload.clone()),
            _ => None,
        })
        .expect("MOVE_APPLIED broadcast to the opponent");
    assert_eq!(applied.turn, Color::Black);
    assert_eq!(applied.game_move, json!({"from": "d2", "to": "d4"}));
    assert!(applied.clocks.white_ms <= 300_000);
    drain(&mut white.rx); // the mover sees the same broadcast

    server
        .handle_text_frame(&black.connection, r#"{"type":"RESIGN"}"#)
        .await;
    let frames = drain(&mut white.rx);
    let ended = frames
        .iter()
        .find_map(|message| match message {
            ServerMessage::GameEnd { payload } => Some(payload.clone()),
            _ => None,
        })
        .expect("GAME_END broadcast");
    assert_eq!(ended.winner, Color::White);
    assert_eq!(ended.reason, "resignation");
    assert_eq!(server.active_games(), 0);

    let records = storage.recorded_results();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result, GameResult::Resigned);
    assert_eq!(records[0].winner_id, Some(white.user_id));
    assert_eq!(records[0].loser_id, Some(black.user_id));
    assert!(!records[0].vs_ai);

    let snapshot = server.metrics_snapshot();
    assert_eq!(snapshot.matches_formed, 1);
    assert_eq!(snapshot.games_started, 1);
    assert_eq!(snapshot.games_completed, 1);
    assert_eq!(snapshot.moves_relayed, 1);
}

#[tokio::test]
async fn game_actions_outside_a_room_are_protocol_errors() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    for frame in [
        r#"{"type":"MOVE_SUBMIT"}"#,
        r#"{"type":"READY"}"#,
        r#"{"type":"RESIGN"}"#,
    ] {
        server.handle_text_frame(&connection, frame).await;
    }
    assert_eq!(
        error_texts(&drain(&mut rx)),
        ["not in a game room", "not in a game room", "not in a game room"]
    );

    // A room without a clock reads the same to the game handlers.
    server
        .handle_text_frame(&connection, r#"{"type":"ROOM_JOIN","room":"quiet"}"#)
        .await;
    drain(&mut rx);
    server
        .handle_text_frame(&connection, r#"{"type":"MOVE_SUBMIT"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut rx)), ["not in a game room"]);
}

#[tokio::test]
async fn turn_order_and_start_errors_reach_the_offender_only() {
    let server = test_server();
    let (_room, mut white, mut black) = pair_players(&server).await;

    server
        .handle_text_frame(&white.connection, r#"{"type":"MOVE_SUBMIT"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut white.rx)), ["game not started"]);

    start_game(&server, &mut white, &mut black).await;

    server
        .handle_text_frame(&black.connection, r#"{"type":"MOVE_SUBMIT"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut black.rx)), ["not your turn"]);
    assert!(
        drain(&mut white.rx).is_empty(),
        "rejections must not be broadcast"
    );
}

#[tokio::test]
async fn only_participants_can_resign_a_running_game() {
    let server = test_server();
    let (room, mut white, mut black) = pair_players(&server).await;
    start_game(&server, &mut white, &mut black).await;

    let (cleo, mut cleo_rx) = connect_and_auth(&server, "token-cleo").await;
    drain(&mut white.rx);
    drain(&mut black.rx);
    server
        .handle_text_frame(&cleo, &format!(r#"{{"type":"ROOM_JOIN","room":"{room}"}}"#))
        .await;
    drain(&mut cleo_rx);

    server.handle_text_frame(&cleo, r#"{"type":"RESIGN"}"#).await;
    assert_eq!(error_texts(&drain(&mut cleo_rx)), ["not a game participant"]);
    assert_eq!(server.active_games(), 1);
    assert!(drain(&mut white.rx).is_empty());
}

#[tokio::test]
async fn reconnect_rotates_the_token_and_notifies_the_room() {
    let server = test_server();
    let (room, mut white, black) = pair_players(&server).await;

    // White is ready, so the clock survives black's disconnect.
    server
        .handle_text_frame(&white.connection, r#"{"type":"READY"}"#)
        .await;
    drain(&mut white.rx);
    let old_token = black.token.clone();
    server.unregister_client(&black.connection);
    drain(&mut white.rx); // PLAYER_DISCONNECTED

    let (revived, mut revived_rx) =
        connect_and_auth(&server, &format!("token-{}", black.username)).await;
    drain(&mut white.rx); // PLAYER_JOINED
    server
        .handle_text_frame(
            &revived,
            &format!(r#"{{"type":"RECONNECT","token":"{old_token}"}}"#),
        )
        .await;

    let frames = drain(&mut revived_rx);
    assert_eq!(frames.len(), 2, "STATE_SYNC then PLAYER_RECONNECTED: {frames:?}");
    let ServerMessage::StateSync { payload: state } = &frames[0] else {
        panic!("expected STATE_SYNC first, got {frames:?}");
    };
    assert_eq!(state.active_player, None);
    let ServerMessage::PlayerReconnected { payload } = &frames[1] else {
        panic!("expected PLAYER_RECONNECTED, got {frames:?}");
    };
    assert_eq!(payload.room, room);
    assert_eq!(payload.user.username, black.username);
    let fresh = payload
        .reconnect_token
        .clone()
        .expect("a replacement token is issued");
    assert_ne!(fresh, old_token);
    assert!(payload.clocks.is_none(), "clocks only travel once running");

    let white_frames = drain(&mut white.rx);
    assert!(
        white_frames.iter().any(|message| matches!(
            message,
            ServerMessage::PlayerReconnected { payload }
                if payload.reconnect_token.is_none() && payload.clocks.is_none()
        )),
        "room members get the stripped notification, got {white_frames:?}"
    );

    // Single use: the redeemed token is spent.
    server
        .handle_text_frame(
            &revived,
            &format!(r#"{{"type":"RECONNECT","token":"{old_token}"}}"#),
        )
        .await;
    assert_eq!(error_texts(&drain(&mut revived_rx)), ["invalid token"]);

    let snapshot = server.metrics_snapshot();
    assert_eq!(snapshot.reconnects_completed, 1);
    assert_eq!(snapshot.reconnects_rejected, 1);
}

#[tokio::test]
async fn reconnect_into_a_running_game_carries_clocks() {
    let server = test_server();
    let (_room, mut white, mut black) = pair_players(&server).await;
    start_game(&server, &mut white, &mut black).await;

    let token = black.token.clone();
    server.unregister_client(&black.connection);
    drain(&mut white.rx);

    let (revived, mut revived_rx) =
        connect_and_auth(&server, &format!("token-{}", black.username)).await;
    drain(&mut white.rx);
    server
        .handle_text_frame(&revived, &format!(r#"{{"type":"RECONNECT","token":"{token}"}}"#))
        .await;

    let frames = drain(&mut revived_rx);
    let ServerMessage::StateSync { payload: state } = &frames[0] else {
        panic!("expected STATE_SYNC first, got {frames:?}");
    };
    assert_eq!(state.active_player, Some(Color::White));
    let reconnected = frames
        .iter()
        .find_map(|message| match message {
            ServerMessage::PlayerReconnected { payload } => Some(payload.clone()),
            _ => None,
        })
        .expect("PLAYER_RECONNECTED delivered");
    assert_eq!(reconnected.active_player, Some(Color::White));
    let clocks = reconnected.clocks.expect("running game clocks attached");
    assert!(clocks.white_ms <= 300_000);
    assert_eq!(clocks.black_ms, 300_000);
}

#[tokio::test]
async fn reconnect_rejects_missing_unknown_and_foreign_tokens() {
    let server = test_server();
    let (_room, mut white, _black) = pair_players(&server).await;

    let (cleo, mut cleo_rx) = connect_and_auth(&server, "token-cleo").await;
    drain(&mut white.rx);

    server
        .handle_text_frame(&cleo, r#"{"type":"RECONNECT"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut cleo_rx)), ["token required"]);

    server
        .handle_text_frame(&cleo, r#"{"type":"RECONNECT","token":"never-minted"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut cleo_rx)), ["invalid token"]);

    // A foreign token is refused but not spent.
    let white_token = white.token.clone();
    server
        .handle_text_frame(
            &cleo,
            &format!(r#"{{"type":"RECONNECT","token":"{white_token}"}}"#),
        )
        .await;
    assert_eq!(error_texts(&drain(&mut cleo_rx)), ["token user mismatch"]);

    server
        .handle_text_frame(
            &white.connection,
            &format!(r#"{{"type":"RECONNECT","token":"{white_token}"}}"#),
        )
        .await;
    let frames = drain(&mut white.rx);
    assert!(
        frames.iter().any(|message| matches!(
            message,
            ServerMessage::PlayerReconnected { payload } if payload.reconnect_token.is_some()
        )),
        "rightful holder can still redeem, got {frames:?}"
    );
}

#[tokio::test]
async fn state_request_serves_a_placeholder_without_a_game() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    server
        .handle_text_frame(&connection, r#"{"type":"STATE_REQUEST","room":"quiet"}"#)
        .await;

    let frames = drain(&mut rx);
    let ServerMessage::StateSync { payload } = &frames[0] else {
        panic!("expected STATE_SYNC, got {frames:?}");
    };
    assert_eq!(payload.fen, "startpos");
    assert_eq!(payload.turn, Color::White);
    assert_eq!(payload.clocks.white_ms, 300_000);
    assert_eq!(payload.clocks.black_ms, 300_000);
    assert_eq!(payload.status, "PLAYING");
    assert!(payload.players.is_empty());
    assert_eq!(payload.active_player, None);
    // The request also seats the sender in the room.
    assert_eq!(server.rooms.occupancy(&"quiet".to_string()), 1);
}

#[tokio::test]
async fn state_request_reflects_a_running_game() {
    let server = test_server();
    let (room, mut white, mut black) = pair_players(&server).await;
    start_game(&server, &mut white, &mut black).await;

    let (cleo, mut cleo_rx) = connect_and_auth(&server, "token-cleo").await;
    server
        .handle_text_frame(&cleo, &format!(r#"{{"type":"STATE_REQUEST","room":"{room}"}}"#))
        .await;

    let frames = drain(&mut cleo_rx);
    let ServerMessage::StateSync { payload } = &frames[0] else {
        panic!("expected STATE_SYNC, got {frames:?}");
    };
    assert_eq!(payload.active_player, Some(Color::White));
    assert_eq!(payload.players.get("white").map(String::as_str), Some(white.username));
    assert_eq!(payload.players.get("black").map(String::as_str), Some(black.username));
}

#[tokio::test]
async fn snapshots_prefer_profile_names_over_seat_names() {
    let (server, storage) = server_with_storage();
    storage.insert_profile(Profile::named(ada_id(), "ada_the_great"));

    let (room, _white, _black) = pair_players(&server).await;
    let (cleo, mut cleo_rx) = connect_and_auth(&server, "token-cleo").await;
    server
        .handle_text_frame(&cleo, &format!(r#"{{"type":"ROOM_JOIN","room":"{room}"}}"#))
        .await;

    let frames = drain(&mut cleo_rx);
    assert_eq!(frames.len(), 2, "STATE_SYNC then ROOM_JOINED: {frames:?}");
    let ServerMessage::StateSync { payload } = &frames[0] else {
        panic!("expected STATE_SYNC first, got {frames:?}");
    };
    let names: Vec<&str> = payload.players.values().map(String::as_str).collect();
    assert!(names.contains(&"ada_the_great"), "profile name used: {names:?}");
    assert!(names.contains(&"bert"), "seat name kept on a miss: {names:?}");
    assert!(matches!(
        &frames[1],
        ServerMessage::RoomJoined { room: joined } if *joined == room
    ));
}

#[tokio::test]
async fn room_join_requires_a_name_and_confirms() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    server
        .handle_text_frame(&connection, r#"{"type":"ROOM_JOIN"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut rx)), ["room required"]);

    server
        .handle_text_frame(&connection, r#"{"type":"ROOM_JOIN","room":"tea"}"#)
        .await;
    let frames = drain(&mut rx);
    // No clock in the room, so no state snapshot either.
    assert!(
        matches!(frames.as_slice(), [ServerMessage::RoomJoined { room }] if room == "tea"),
        "expected a bare ROOM_JOINED, got {frames:?}"
    );
}

#[tokio::test]
async fn client_room_names_are_sanitized_before_use() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    server
        .handle_text_frame(&connection, r#"{"type":"ROOM_JOIN","room":"tea time!"}"#)
        .await;
    let frames = drain(&mut rx);
    assert!(
        matches!(frames.as_slice(), [ServerMessage::RoomJoined { room }] if room == "tea_time_"),
        "expected the sanitized name echoed back, got {frames:?}"
    );
    assert_eq!(server.rooms.occupancy(&"tea_time_".to_string()), 1);
    assert_eq!(server.rooms.occupancy(&"tea time!".to_string()), 0);
}

#[tokio::test]
async fn match_found_relay_reflects_a_demo_payload() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    server
        .handle_text_frame(&connection, r#"{"type":"MATCH_FOUND"}"#)
        .await;
    let payload = match_payload(&drain(&mut rx));
    assert_eq!(payload.room, "demo-room");
    assert_eq!(payload.players.white, "ada");
    assert_eq!(payload.players.black, "opponent");
    assert!(payload.clocks.is_none());
    assert!(!payload.reconnect_token.is_empty());

    server
        .handle_text_frame(&connection, r#"{"type":"MATCH_FOUND","room":"stage_3"}"#)
        .await;
    assert_eq!(match_payload(&drain(&mut rx)).room, "stage_3");

    // With no room given, the sender's current room wins over the fallback.
    server
        .handle_text_frame(&connection, r#"{"type":"ROOM_JOIN","room":"current_5"}"#)
        .await;
    drain(&mut rx);
    server
        .handle_text_frame(&connection, r#"{"type":"MATCH_FOUND"}"#)
        .await;
    assert_eq!(match_payload(&drain(&mut rx)).room, "current_5");
}

#[tokio::test]
async fn ping_pongs_and_unknown_types_are_named() {
    let server = test_server();
    let (connection, mut rx) = connect_and_auth(&server, "token-ada").await;

    server
        .handle_text_frame(&connection, r#"{"type":"PING"}"#)
        .await;
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [ServerMessage::Pong]
    ));

    server
        .handle_text_frame(&connection, r#"{"type":"WIBBLE"}"#)
        .await;
    assert_eq!(error_texts(&drain(&mut rx)), ["unknown message type"]);
}
