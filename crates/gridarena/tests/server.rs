//! End-to-end tests: real server, real WebSocket clients, JSON frames.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gridarena::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port with simulated network conditions off,
/// so moves land on the next tick.
async fn start_server() -> String {
    start_server_with(RoomConfig {
        sim: SimConfig::disabled(),
        ..RoomConfig::default()
    })
    .await
}

async fn start_server_with(config: RoomConfig) -> String {
    let server = GridarenaServer::builder()
        .bind("127.0.0.1:0")
        .room_defaults(config)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_client(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::text(text)).await.expect("send");
}

/// Connects and joins, returning the socket after the join frame is sent.
async fn join(addr: &str, room: &str, player: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    send_client(
        &mut ws,
        &ClientMessage::Join {
            room_id: RoomId::from(room),
            player_id: PlayerId::from(player),
        },
    )
    .await;
    ws
}

async fn recv_payload(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("server should keep sending")
            .expect("stream should stay open")
            .expect("frame should arrive");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("valid payload JSON");
        }
    }
}

/// Reads payloads until one satisfies `pred`; ticks keep frames flowing,
/// so this terminates quickly or panics at the bound.
async fn wait_for(
    ws: &mut ClientWs,
    mut pred: impl FnMut(&ServerMessage) -> bool,
) -> ServerMessage {
    for _ in 0..100 {
        let msg = recv_payload(ws).await;
        if pred(&msg) {
            return msg;
        }
    }
    panic!("expected payload not observed within 100 frames");
}

fn player_x(msg: &ServerMessage, id: &str) -> Option<f64> {
    let players = match msg {
        ServerMessage::State { players, .. }
        | ServerMessage::Delta { players, .. }
        | ServerMessage::Snapshot { players, .. } => players,
    };
    players.iter().find(|p| p.id.as_str() == id).map(|p| p.x)
}

fn move_right(seq: i64) -> ClientMessage {
    ClientMessage::Move {
        command: "right".into(),
        seq,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_receives_snapshot_at_spawn() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;

    let msg = recv_payload(&mut ws).await;
    match msg {
        ServerMessage::Snapshot { players, .. } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id.as_str(), "alice");
            assert_eq!(players[0].x, 50.0);
            assert_eq!(players[0].y, 50.0);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_move_is_applied_and_acked() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;
    recv_payload(&mut ws).await; // snapshot

    send_client(&mut ws, &move_right(1)).await;

    let msg = wait_for(&mut ws, |m| player_x(m, "alice") == Some(51.0)).await;
    let acks = match &msg {
        ServerMessage::State { acks, .. }
        | ServerMessage::Delta { acks, .. }
        | ServerMessage::Snapshot { acks, .. } => acks,
    };
    assert_eq!(acks.get(&PlayerId::from("alice")), Some(&1));
}

#[tokio::test]
async fn test_two_clients_see_each_other() {
    let addr = start_server().await;
    let mut ws_a = join(&addr, "room-1", "a").await;
    let mut ws_b = join(&addr, "room-1", "b").await;

    // a sees b arrive in a broadcast.
    wait_for(&mut ws_a, |m| player_x(m, "b").is_some()).await;

    // b moves; a observes the new position.
    send_client(&mut ws_b, &move_right(1)).await;
    wait_for(&mut ws_a, |m| player_x(m, "b") == Some(51.0)).await;
}

#[tokio::test]
async fn test_disconnect_is_broadcast_as_removal() {
    let addr = start_server().await;
    let mut ws_a = join(&addr, "room-1", "a").await;
    let ws_b = join(&addr, "room-1", "b").await;

    wait_for(&mut ws_a, |m| player_x(m, "b").is_some()).await;
    drop(ws_b);

    wait_for(&mut ws_a, |m| match m {
        ServerMessage::Delta { removed, .. } => {
            removed.contains(&PlayerId::from("b"))
        }
        ServerMessage::State { players, .. } => {
            !players.iter().any(|p| p.id.as_str() == "b")
        }
        _ => false,
    })
    .await;
}

#[tokio::test]
async fn test_reconnect_restores_position() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;
    recv_payload(&mut ws).await; // snapshot

    send_client(&mut ws, &move_right(1)).await;
    wait_for(&mut ws, |m| player_x(m, "alice") == Some(51.0)).await;
    ws.close(None).await.expect("close");
    // Let the departure drain on the next tick before rejoining.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Rejoin: the snapshot resumes at the cached position, not at spawn.
    let mut ws = join(&addr, "room-1", "alice").await;
    let msg = wait_for(&mut ws, |m| {
        matches!(m, ServerMessage::Snapshot { .. })
            && player_x(m, "alice").is_some()
    })
    .await;
    assert_eq!(player_x(&msg, "alice"), Some(51.0));
}

#[tokio::test]
async fn test_duplicate_join_survives_old_connection_close() {
    let addr = start_server().await;
    let mut ws_old = join(&addr, "room-1", "dup").await;
    recv_payload(&mut ws_old).await; // snapshot

    // Same player id joins again; the room replaces the connection.
    let mut ws_new = join(&addr, "room-1", "dup").await;
    wait_for(&mut ws_new, |m| {
        matches!(m, ServerMessage::Snapshot { .. })
            && player_x(m, "dup").is_some()
    })
    .await;

    // The replaced connection tears down; its departure must not evict
    // the live player.
    let _ = ws_old.close(None).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    send_client(&mut ws_new, &move_right(1)).await;
    wait_for(&mut ws_new, |m| player_x(m, "dup") == Some(51.0)).await;
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let addr = start_server().await;
    let mut ws_a = join(&addr, "room-1", "a").await;
    let mut ws_b = join(&addr, "room-2", "b").await;

    let snap_a = recv_payload(&mut ws_a).await;
    let snap_b = recv_payload(&mut ws_b).await;
    assert_eq!(player_x(&snap_a, "a"), Some(50.0));
    assert!(player_x(&snap_a, "b").is_none());
    assert_eq!(player_x(&snap_b, "b"), Some(50.0));
    assert!(player_x(&snap_b, "a").is_none());
}

#[tokio::test]
async fn test_snapshot_request_returns_full_state() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;
    recv_payload(&mut ws).await; // join snapshot

    send_client(&mut ws, &ClientMessage::Snapshot).await;
    let msg = wait_for(&mut ws, |m| {
        matches!(m, ServerMessage::Snapshot { .. })
    })
    .await;
    assert_eq!(player_x(&msg, "alice"), Some(50.0));
}

#[tokio::test]
async fn test_unknown_frame_type_is_ignored() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;
    recv_payload(&mut ws).await;

    // Unknown type and malformed JSON both leave the connection usable.
    ws.send(Message::text(r#"{"type":"teleport","x":0}"#))
        .await
        .expect("send");
    ws.send(Message::text("not json")).await.expect("send");

    send_client(&mut ws, &move_right(1)).await;
    wait_for(&mut ws, |m| player_x(m, "alice") == Some(51.0)).await;
}

#[tokio::test]
async fn test_first_frame_must_be_join() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_client(&mut ws, &move_right(1)).await;

    // Server drops the connection without ever sending a payload.
    let result =
        tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {}
        Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_move_command_is_a_no_op() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;
    recv_payload(&mut ws).await;

    send_client(
        &mut ws,
        &ClientMessage::Move {
            command: "diagonal".into(),
            seq: 1,
        },
    )
    .await;

    // The intent is accepted (it gets acked) but the position holds.
    let msg = wait_for(&mut ws, |m| {
        let acks = match m {
            ServerMessage::State { acks, .. }
            | ServerMessage::Delta { acks, .. }
            | ServerMessage::Snapshot { acks, .. } => acks,
        };
        acks.get(&PlayerId::from("alice")) == Some(&1)
    })
    .await;
    assert!(player_x(&msg, "alice").is_none_or(|x| x == 50.0));
}

#[tokio::test]
async fn test_stale_seq_not_applied_across_reconnect() {
    let addr = start_server().await;
    let mut ws = join(&addr, "room-1", "alice").await;
    recv_payload(&mut ws).await;

    send_client(&mut ws, &move_right(3)).await;
    wait_for(&mut ws, |m| player_x(m, "alice") == Some(51.0)).await;
    ws.close(None).await.expect("close");
    // Let the departure drain on the next tick before rejoining.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Retransmits from before the disconnect stay rejected after rejoin.
    let mut ws = join(&addr, "room-1", "alice").await;
    send_client(&mut ws, &move_right(3)).await;
    send_client(&mut ws, &move_right(4)).await;

    let msg = wait_for(&mut ws, |m| player_x(m, "alice") == Some(52.0)).await;
    let acks = match &msg {
        ServerMessage::State { acks, .. }
        | ServerMessage::Delta { acks, .. }
        | ServerMessage::Snapshot { acks, .. } => acks,
    };
    assert_eq!(acks.get(&PlayerId::from("alice")), Some(&4));
}
