//! Codec trait and implementations for message frames.
//!
//! A codec converts between Rust types and the text of a single transport
//! frame. The rest of the stack only depends on the [`Codec`] trait, so a
//! binary codec could be swapped in without touching the room or server
//! layers. The default is [`JsonCodec`], which matches what browser
//! clients produce and makes frames trivially inspectable.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values into frame text and decodes frame text back.
///
/// Bounds: codecs are shared across Tokio tasks (`Send + Sync`) and stored
/// in long-lived actors (`'static`).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into the text of one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes one frame's text back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the text is malformed or does
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] producing JSON text frames via `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientMessage, PlayerId, RoomId};

    #[test]
    fn test_json_codec_round_trip() {
        let codec = JsonCodec;
        let msg = ClientMessage::Join {
            room_id: RoomId::new("room-1"),
            player_id: PlayerId::new("alice"),
        };

        let text = codec.encode(&msg).unwrap();
        let decoded: ClientMessage = codec.decode(&text).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_json_codec_decode_garbage_fails() {
        let codec = JsonCodec;
        let result: Result<ClientMessage, _> = codec.decode("{{{");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
