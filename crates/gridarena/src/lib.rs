//! # Gridarena
//!
//! Server-authoritative multiplayer grid arena over WebSockets.
//!
//! Clients join a room, send directional move intents, and receive the
//! room's authoritative state every tick — a delta when cheap, a full
//! state when not. Intents pass through an admission stage that simulates
//! configurable network delay and loss before the tick loop applies
//! sequencing, rate limiting, and clamped movement.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridarena::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GridarenaError> {
//!     let server = GridarenaServer::builder()
//!         .bind("127.0.0.1:8080")
//!         .precreate_room("room-1")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::GridarenaError;
pub use server::{GridarenaServer, GridarenaServerBuilder};

// Re-exports so consumers don't need the sub-crates on their own.
pub use gridarena_protocol::{
    ClientMessage, Codec, Direction, JsonCodec, PlayerId, PlayerState,
    ProtocolError, RoomId, ServerMessage,
};
pub use gridarena_room::{
    ConfigUpdate, MetricsSnapshot, RoomConfig, RoomError, RoomHandle,
    RoomRegistry, SimConfig,
};
pub use gridarena_tick::{TickConfig, TickInfo, TickScheduler};
pub use gridarena_transport::{
    Connection, ConnectionId, Transport, TransportError, WebSocketTransport,
};

/// Everything needed to stand up a server.
pub mod prelude {
    pub use crate::{
        ClientMessage, ConfigUpdate, Direction, GridarenaError,
        GridarenaServer, GridarenaServerBuilder, PlayerId, PlayerState,
        RoomConfig, RoomId, ServerMessage, SimConfig,
    };
}
