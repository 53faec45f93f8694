//! Client error type.

use strand_protocol::ProtocolError;

/// Errors surfaced by the sync provider and its transport.
///
/// Note that most failures inside the sync core never reach this type:
/// transport drops recover via reconnect, malformed frames are dropped, and
/// version divergence resynchronizes by snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Underlying connection failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The provider's driver task is gone (the provider was dropped).
    #[error("sync provider task has terminated")]
    ProviderGone,
}
