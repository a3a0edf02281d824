//! Wire protocol for ircbridge.
//!
//! This crate defines what travels over a client's WebSocket:
//!
//! - **Types** ([`ClientCommand`], [`Notification`], [`ChatMessage`]):
//!   the structured messages exchanged with the browser.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw frames) and the
//! session bridge (upstream chat connection). It knows nothing about
//! sockets or IRC: only the shape of the JSON.
//!
//! ```text
//! Transport (frames) → Protocol (ClientCommand) → Session (bridge actor)
//! Session (UpstreamEvent) → Protocol (Notification) → Transport (frames)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChatMessage, ClientCommand, CloseEvent, MessageKind, Notification,
    INVALID_MESSAGE_FORMAT,
};
