//! In-room player state and the outbound frame path.

use std::sync::Arc;

use gridarena_protocol::{Direction, PlayerId, PlayerState};
use tokio::sync::mpsc;

/// An encoded payload, shared across every recipient of a broadcast.
pub type OutboundFrame = Arc<str>;

/// Sender half of a player's bounded outbound queue. The connection layer
/// owns the receiver and pumps frames onto the wire.
pub type OutboundSender = mpsc::Sender<OutboundFrame>;

/// A player as the room sees it: authoritative position plus the handle for
/// delivering frames to their connection.
#[derive(Debug)]
pub(crate) struct Player {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    sender: OutboundSender,
}

impl Player {
    pub fn new(id: PlayerId, x: f64, y: f64, sender: OutboundSender) -> Self {
        Self { id, x, y, sender }
    }

    /// The wire-facing view of this player.
    pub fn state(&self) -> PlayerState {
        PlayerState {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
        }
    }

    /// Moves one step in `direction`, clamped to the world bounds.
    pub fn apply_move(
        &mut self,
        direction: Direction,
        step: f64,
        width: f64,
        height: f64,
    ) {
        match direction {
            Direction::Up => self.y -= step,
            Direction::Down => self.y += step,
            Direction::Left => self.x -= step,
            Direction::Right => self.x += step,
            Direction::None => {}
        }
        self.x = self.x.clamp(0.0, width);
        self.y = self.y.clamp(0.0, height);
    }

    /// Whether `other` is a handle to this player's outbound queue, i.e.
    /// belongs to the same connection incarnation.
    pub fn same_channel(&self, other: &OutboundSender) -> bool {
        self.sender.same_channel(other)
    }

    /// Queues a frame for this player's connection without waiting.
    ///
    /// A slow consumer sheds the frame rather than stalling the tick; the
    /// next full state payload or a snapshot request resynchronizes them.
    pub fn send(&self, frame: OutboundFrame) {
        if let Err(mpsc::error::TrySendError::Full(_)) =
            self.sender.try_send(frame)
        {
            tracing::debug!(
                player_id = %self.id,
                "outbound queue full — shedding frame"
            );
        }
    }
}
