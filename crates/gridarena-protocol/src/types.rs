//! Core protocol types for Gridarena's wire format.
//!
//! Every message is a JSON text frame tagged by a `type` field. Inbound
//! frames are intents and requests from clients; outbound frames are the
//! authoritative per-tick updates (`state`/`delta`) and on-demand
//! `snapshot` payloads.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player identifier, supplied by the client at join time.
///
/// Opaque to the server; unique within a room only while the player is
/// present (a later join with the same id replaces the earlier one).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a player id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A room identifier. Rooms are created on first reference and live for
/// the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// The authoritative interpretation of a client's move intent.
///
/// Commands are parsed case-insensitively; anything unrecognized becomes
/// [`Direction::None`], which resolves as a no-op move (it still passes
/// through sequencing and rate limiting like any other intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Parses a wire command into a direction.
    pub fn from_command(command: &str) -> Self {
        match command.to_ascii_lowercase().as_str() {
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player state (wire projection)
// ---------------------------------------------------------------------------

/// The broadcast projection of a player: id and position, nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages clients send to the server.
///
/// Internally tagged on `type` with lowercase tags, matching what the
/// browser client sends: `{"type":"move","command":"up","seq":3}`.
/// A frame with an unrecognized `type` deserializes to [`Self::Unknown`]
/// and is ignored without error, per the protocol contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// First frame on every connection: which room, as whom.
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },

    /// A directional move intent. `seq` is the client's local sequence
    /// number for deduplication and acknowledgment; absent or zero means
    /// unordered (still rate-limited, never acked).
    Move {
        command: String,
        #[serde(default)]
        seq: i64,
    },

    /// Request an immediate authoritative snapshot outside the tick cycle.
    Snapshot,

    /// Any `type` tag this protocol version doesn't know.
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends to clients.
///
/// `acks` maps each player with a recorded sequence to the last sequence
/// the server accepted for them — clients use it to prune confirmed
/// pending input. Every payload names the tick it is authoritative for;
/// frames may be dropped under outbound saturation, so clients must not
/// assume strictly increasing ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Full state: every present player.
    State {
        tick: u64,
        players: Vec<PlayerState>,
        acks: HashMap<PlayerId, i64>,
    },

    /// Incremental update: only changed/new players, plus explicit
    /// removals since the previous broadcast.
    Delta {
        tick: u64,
        players: Vec<PlayerState>,
        removed: Vec<PlayerId>,
        acks: HashMap<PlayerId, i64>,
    },

    /// On-demand full state, same shape as `State`; sent on join/rejoin
    /// or explicit request rather than per tick.
    Snapshot {
        tick: u64,
        players: Vec<PlayerState>,
        acks: HashMap<PlayerId, i64>,
    },
}

impl ServerMessage {
    /// The tick this payload is authoritative for.
    pub fn tick(&self) -> u64 {
        match self {
            Self::State { tick, .. }
            | Self::Delta { tick, .. }
            | Self::Snapshot { tick, .. } => *tick,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
