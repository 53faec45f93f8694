//! Protocol-layer errors.

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An inbound frame could not be parsed.
    #[error("failed to decode frame: {0}")]
    Decode(serde_json::Error),

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(serde_json::Error),
}
