//! Errors that end an IRC connection task.

/// Why a connection task stopped early. The text becomes the `close`
/// reason reported to the session.
#[derive(Debug, thiserror::Error)]
pub enum IrcError {
    /// TCP connect, read, or write failed.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}
