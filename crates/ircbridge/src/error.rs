//! Unified error type for ircbridge.

use ircbridge_api::{LookupError, TokenError};
use ircbridge_protocol::ProtocolError;
use ircbridge_session::SessionError;
use ircbridge_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A transport-level error (socket send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bridge closed, bridge task failed).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The token exchange is misconfigured or failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The match lookup is misconfigured or failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Startup configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let bridge_err: BridgeError = err.into();
        assert!(matches!(bridge_err, BridgeError::Transport(_)));
        assert!(bridge_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_session_error() {
        let bridge_err: BridgeError = SessionError::BridgeClosed.into();
        assert!(matches!(bridge_err, BridgeError::Session(_)));
    }

    #[test]
    fn test_from_token_error() {
        let bridge_err: BridgeError =
            TokenError::Configuration("bad url".into()).into();
        assert!(matches!(bridge_err, BridgeError::Token(_)));
        assert!(bridge_err.to_string().contains("bad url"));
    }

    #[test]
    fn test_from_config_error() {
        let bridge_err: BridgeError =
            ConfigError::MissingEnvVar("OSU_CLIENT_ID".into()).into();
        assert!(matches!(bridge_err, BridgeError::Config(_)));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let bridge_err: BridgeError = err.into();
        assert!(matches!(bridge_err, BridgeError::Io(_)));
    }
}
