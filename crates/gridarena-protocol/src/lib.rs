//! Wire protocol for Gridarena.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`PlayerState`],
//!   [`Direction`], the id newtypes) — the structures that travel on the
//!   wire as JSON text frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to and from frame text.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! The protocol layer sits between transport (raw frames) and the room
//! layer (authoritative state). It knows nothing about connections, ticks,
//! or rooms — only message shapes.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Direction, PlayerId, PlayerState, RoomId, ServerMessage,
};
