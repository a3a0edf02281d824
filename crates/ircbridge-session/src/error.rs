//! Error types for the session layer.

/// Errors that can occur while driving a session bridge.
///
/// Upstream chat problems are not errors here: they arrive as
/// [`UpstreamEvent`](crate::UpstreamEvent)s and are forwarded to the
/// client as notifications.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The bridge actor has stopped and no longer accepts input.
    #[error("session bridge is closed")]
    BridgeClosed,

    /// The bridge actor task panicked or was aborted.
    #[error("session bridge task failed: {0}")]
    TaskFailed(String),
}
