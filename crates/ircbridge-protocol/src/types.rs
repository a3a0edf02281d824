//! Core protocol types for ircbridge's client-facing wire format.
//!
//! Everything in this module travels over the browser's WebSocket as a
//! JSON object with a `type` field. Inbound frames become
//! [`ClientCommand`]s; outbound frames are [`Notification`]s.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Error text sent back for any inbound frame that can't be decoded.
///
/// Deliberately generic: the decode error itself is only logged.
pub const INVALID_MESSAGE_FORMAT: &str = "invalid message format";

// ---------------------------------------------------------------------------
// ClientCommand: browser → server
// ---------------------------------------------------------------------------

/// A command sent by the web client.
///
/// `#[serde(tag = "type")]` produces the "internally tagged" shape the
/// browser already speaks:
///
/// ```text
/// {"type":"connect","username":"alice","password":"..."}
/// {"type":"message","target":"#osu","message":"hi"}
/// ```
///
/// Any other `type` value decodes as [`ClientCommand::Unknown`] and is
/// ignored by the session bridge. A frame with no `type` at all, or a known
/// `type` with missing fields, fails to decode.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Open the upstream chat connection as `username`.
    ///
    /// The password is relayed upstream untouched and never logged
    /// (`SecretString` redacts itself in `Debug`).
    Connect {
        username: String,
        #[serde(default)]
        password: Option<SecretString>,
    },

    /// Join a channel.
    Join { channel: String },

    /// Send a chat message to a channel or user.
    Message { target: String, message: String },

    /// Leave a channel.
    Part { target: String },

    /// Disconnect from the chat network with an optional reason.
    Quit {
        #[serde(default)]
        message: Option<String>,
    },

    /// Any unrecognized `type`.
    #[serde(other)]
    Unknown,
}

impl ClientCommand {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Join { .. } => "join",
            Self::Message { .. } => "message",
            Self::Part { .. } => "part",
            Self::Quit { .. } => "quit",
            Self::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Chat payloads
// ---------------------------------------------------------------------------

/// What kind of chat line a [`ChatMessage`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A regular `PRIVMSG`.
    Privmsg,
    /// A `NOTICE`.
    Notice,
    /// A CTCP `ACTION` (`/me does something`).
    Action,
}

/// A chat message observed on the upstream connection.
///
/// Forwarded to the browser as-is inside [`Notification::Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub kind: MessageKind,
    /// Sender's nickname.
    pub nick: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Channel name or, for private messages, our own nick.
    pub target: String,
    pub message: String,
}

/// Details attached to a `close` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    /// Human-readable reason the upstream connection ended.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Notification: server → browser
// ---------------------------------------------------------------------------

/// A message pushed to the web client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    /// The upstream network accepted our registration.
    Connected,

    /// Something went wrong; the session is still alive.
    Error { error: String },

    /// The upstream connection ended; the session is over.
    Close { event: CloseEvent },

    /// Someone (possibly us) joined a channel.
    Join { channel: String, nick: String },

    /// A chat line, fields flattened next to `"type":"message"`.
    Message(ChatMessage),
}

impl Notification {
    /// The generic reply to an undecodable client frame.
    pub fn invalid_message_format() -> Self {
        Self::Error {
            error: INVALID_MESSAGE_FORMAT.to_string(),
        }
    }
}
