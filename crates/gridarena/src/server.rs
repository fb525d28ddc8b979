//! `GridarenaServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rooms. Each accepted
//! connection gets its own handler task; all game state lives in the room
//! actors behind the registry.

use std::sync::Arc;

use gridarena_protocol::{JsonCodec, RoomId};
use gridarena_room::{RoomConfig, RoomRegistry};
use gridarena_transport::{Transport, WebSocketTransport};

use crate::GridarenaError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: RoomRegistry<JsonCodec>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Gridarena server.
///
/// # Example
///
/// ```rust,ignore
/// use gridarena::prelude::*;
///
/// let server = GridarenaServer::builder()
///     .bind("0.0.0.0:8080")
///     .precreate_room("room-1")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct GridarenaServerBuilder {
    bind_addr: String,
    room_defaults: RoomConfig,
    precreate: Vec<RoomId>,
}

impl GridarenaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_defaults: RoomConfig::default(),
            precreate: Vec::new(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration new rooms start from.
    pub fn room_defaults(mut self, config: RoomConfig) -> Self {
        self.room_defaults = config;
        self
    }

    /// Creates a room at startup instead of on first join.
    pub fn precreate_room(mut self, room_id: &str) -> Self {
        self.precreate.push(RoomId::from(room_id));
        self
    }

    /// Builds the server, binding the transport and spawning any
    /// pre-created rooms.
    pub async fn build(self) -> Result<GridarenaServer, GridarenaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: RoomRegistry::new(self.room_defaults, JsonCodec),
            codec: JsonCodec,
        });
        for room_id in &self.precreate {
            state.rooms.get_or_create(room_id).await;
        }

        Ok(GridarenaServer { transport, state })
    }
}

impl Default for GridarenaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gridarena server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GridarenaServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl GridarenaServer {
    /// Creates a new builder.
    pub fn builder() -> GridarenaServerBuilder {
        GridarenaServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), GridarenaError> {
        tracing::info!("gridarena server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
