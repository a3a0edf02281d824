//! Minimal IRC client for ircbridge sessions.
//!
//! Implements [`ChatConnector`](ircbridge_session::ChatConnector) over plain
//! TCP with just enough of the protocol for a chat relay: registration,
//! keepalive, channel membership, messages, and error reporting. There is no
//! TLS, SASL, or capability negotiation.
//!
//! ```rust,no_run
//! use ircbridge_irc::IrcConnector;
//!
//! let connector = IrcConnector::new();
//! // Hand `connector` to the server; each session calls `connect` on it.
//! ```

mod codec;
mod connector;
mod error;
mod message;

pub use codec::{IrcCodec, MAX_LINE_LENGTH};
pub use connector::{IrcClient, IrcConnector, DEFAULT_QUIT_GRACE};
pub use error::IrcError;
pub use message::IrcLine;
