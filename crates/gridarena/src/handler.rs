//! Per-connection handler: join handshake, read pump, and write pump.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive the join frame → resolve the room, place the player
//!   2. Spawn the write pump draining the player's outbound queue
//!   3. Loop: receive frames → route intents and requests to the room
//!   4. On exit (close, error, or idle timeout) → queue the departure

use std::sync::Arc;
use std::time::Duration;

use gridarena_protocol::{
    ClientMessage, Codec, Direction, PlayerId, ProtocolError,
};
use gridarena_room::{OutboundSender, RoomHandle};
use gridarena_transport::{Connection, WebSocketConnection};

use crate::GridarenaError;
use crate::server::ServerState;

/// How long a connection may sit silent before the join frame arrives.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a joined connection may sit silent before being dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Capacity of the per-player outbound frame queue. Saturation sheds
/// frames inside the room rather than stalling its tick.
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Drop guard that queues the player's departure when the handler exits.
///
/// This ensures cleanup happens even if the handler errors out or panics.
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async send. The guard carries its own outbound sender so the room can
/// tell this incarnation's departure apart from a replacement's.
struct DepartureGuard {
    player_id: PlayerId,
    sender: OutboundSender,
    room: RoomHandle,
}

impl Drop for DepartureGuard {
    fn drop(&mut self) {
        let player_id = self.player_id.clone();
        let sender = self.sender.clone();
        let room = self.room.clone();
        tokio::spawn(async move {
            if let Err(e) = room.leave(player_id.clone(), sender).await {
                tracing::debug!(%player_id, error = %e, "departure not queued");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), GridarenaError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: join handshake ---
    let (room, player_id) = perform_join(&conn, &state).await?;
    tracing::info!(
        %conn_id,
        %player_id,
        room_id = %room.room_id(),
        "player connected"
    );

    // The room owns the sender; joining queues the initial snapshot onto
    // it before the write pump even starts.
    let (outbound_tx, mut outbound_rx) =
        tokio::sync::mpsc::channel(OUTBOUND_QUEUE_SIZE);
    room.join(player_id.clone(), outbound_tx.clone()).await?;
    let _guard = DepartureGuard {
        player_id: player_id.clone(),
        sender: outbound_tx,
        room: room.clone(),
    };

    // --- Step 2: write pump ---
    let writer = conn.clone();
    let mut write_pump = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if writer.send(&frame).await.is_err() {
                break;
            }
        }
    });

    // --- Step 3: read pump ---
    // The write pump ending means the room dropped this incarnation's
    // sender (replaced by a newer join) or the socket broke; tear down
    // instead of lingering until the idle timeout.
    tokio::select! {
        _ = read_pump(&conn, &state, &room, &player_id) => {}
        _ = &mut write_pump => {
            tracing::debug!(%player_id, "outbound queue closed — tearing down");
        }
    }

    // --- Step 4: teardown ---
    write_pump.abort();
    let _ = conn.close().await;
    // _guard drops here → departure queued.
    Ok(())
}

/// Waits for the join frame and resolves the target room.
///
/// Anything other than a timely, well-formed join frame fails the
/// connection; the protocol has no pre-join traffic.
async fn perform_join(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
) -> Result<(RoomHandle, PlayerId), GridarenaError> {
    let text = match tokio::time::timeout(JOIN_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(text))) => text,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before join".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage(
                "join timed out".into(),
            )
            .into());
        }
    };

    match state.codec.decode(&text)? {
        ClientMessage::Join { room_id, player_id } => {
            let room = state.rooms.get_or_create(&room_id).await;
            Ok((room, player_id))
        }
        _ => Err(ProtocolError::InvalidMessage(
            "first frame must be join".into(),
        )
        .into()),
    }
}

/// Receives frames until the connection closes, errors, or idles out.
async fn read_pump(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    room: &RoomHandle,
    player_id: &PlayerId,
) {
    loop {
        let text = match tokio::time::timeout(IDLE_TIMEOUT, conn.recv()).await
        {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                return;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                return;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection idle — dropping");
                return;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&text) {
            Ok(msg) => msg,
            Err(e) => {
                // Malformed frames don't kill the connection.
                tracing::debug!(
                    %player_id,
                    error = %e,
                    "failed to decode frame"
                );
                continue;
            }
        };

        match msg {
            ClientMessage::Move { command, seq } => {
                room.submit_intent(
                    player_id.clone(),
                    Direction::from_command(&command),
                    seq,
                )
                .await;
            }
            ClientMessage::Snapshot => {
                if let Err(e) = room.request_snapshot(player_id.clone()).await
                {
                    tracing::debug!(
                        %player_id,
                        error = %e,
                        "snapshot request failed"
                    );
                }
            }
            ClientMessage::Join { .. } => {
                tracing::debug!(
                    %player_id,
                    "ignoring join frame on joined connection"
                );
            }
            ClientMessage::Unknown => {
                tracing::debug!(%player_id, "ignoring unknown frame type");
            }
        }
    }
}
