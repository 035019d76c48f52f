//! Codec trait and implementations for turning events into frames.
//!
//! The layers above don't care HOW a frame is serialized, only that
//! something implements [`Codec`]. Today that is [`JsonCodec`], which
//! matches the text frames the game server speaks.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Frame, InboundEvent, OutboundEvent, ProtocolError};

/// A codec that encodes Rust types to text frames and decodes them back.
///
/// `Send + Sync + 'static` so one codec can be shared by the link task and
/// the event loop.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or doesn't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;

    /// Encodes an outbound event as a ready-to-send frame.
    fn encode_event(&self, event: &OutboundEvent) -> Result<String, ProtocolError> {
        self.encode(event)
    }

    /// Decodes a received frame into an inbound event.
    ///
    /// `Ok(None)` means the frame was well-formed but names an event this
    /// client doesn't know.
    fn decode_event(&self, text: &str) -> Result<Option<InboundEvent>, ProtocolError> {
        let frame: Frame = self.decode(text)?;
        InboundEvent::from_frame(frame)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use cardroom_protocol::{Codec, InboundEvent, JsonCodec};
///
/// let codec = JsonCodec;
/// let event = codec
///     .decode_event(r#"{"event":"gameEnded","data":{"reason":"host left"}}"#)
///     .unwrap()
///     .unwrap();
/// assert!(matches!(event, InboundEvent::GameEnded(_)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
