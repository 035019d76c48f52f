//! Error types for the protocol layer.
//!
//! Each crate in Cardroom defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning frames into events (or back),
//! not in networking or session bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a frame).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame itself is not a valid `{event, data}` envelope.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope names a known event but its payload has the wrong shape.
    #[error("malformed {event} payload: {source}")]
    MalformedPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
