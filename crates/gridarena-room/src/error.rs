use gridarena_protocol::RoomId;

/// Errors surfaced by room handles.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's actor is gone; its channels are closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
