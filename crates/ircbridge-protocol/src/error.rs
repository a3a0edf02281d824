//! Error types for the protocol layer.
//!
//! Each ircbridge crate defines its own error enum. A `ProtocolError`
//! always means the problem is in turning frames into commands (or
//! notifications into frames), never in networking or IRC.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a notification into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a client frame into a command).
    ///
    /// Common causes: the frame is not JSON at all, the `type` field is
    /// missing, or a known command is missing one of its fields. The
    /// session bridge answers these with a generic
    /// [`INVALID_MESSAGE_FORMAT`](crate::INVALID_MESSAGE_FORMAT) error.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
