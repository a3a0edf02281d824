//! The seam between a session bridge and the chat network.
//!
//! The bridge never speaks IRC itself. It asks a [`ChatConnector`] for a
//! connection and gets back a [`ChatClient`] handle for outgoing actions;
//! everything the network says comes back as [`UpstreamEvent`]s on the
//! channel the bridge handed to `connect`.
//!
//! Production uses `ircbridge_irc::IrcConnector`. Tests plug in a fake that
//! records calls and lets the test script the events.

use ircbridge_protocol::ChatMessage;
use secrecy::SecretString;
use tokio::sync::mpsc;

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Chat network host, e.g. `irc.ppy.sh`.
    pub host: String,
    pub port: u16,
    /// Nickname to register with. Also used as the username.
    pub nick: String,
    /// Server password, relayed untouched. `None` skips `PASS`.
    pub password: Option<SecretString>,
}

/// Something the chat network told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Registration was accepted; the connection is usable.
    Registered,
    /// A chat line addressed to us or to a channel we're in.
    Message(ChatMessage),
    /// Someone joined a channel.
    Join { channel: String, nick: String },
    /// A non-fatal error report (bad password, unknown channel, ...).
    Error { message: String },
    /// The connection is gone. No further events follow.
    Closed { reason: String },
}

/// Sender half the connector uses to deliver [`UpstreamEvent`]s.
pub type UpstreamEvents = mpsc::UnboundedSender<UpstreamEvent>;

/// Factory for upstream connections. One value is shared by all sessions.
pub trait ChatConnector: Send + Sync + 'static {
    /// The per-session handle this connector produces.
    type Client: ChatClient;

    /// Starts connecting and returns immediately.
    ///
    /// Must not wait for the network: the handshake outcome (and any
    /// failure to even reach the host) is reported later through `events`,
    /// ending with [`UpstreamEvent::Closed`] when the connection is gone.
    fn connect(
        &self,
        params: ConnectParams,
        events: UpstreamEvents,
    ) -> Self::Client;
}

/// Outgoing actions on one upstream connection.
///
/// All methods only enqueue work and never block.
pub trait ChatClient: Send + 'static {
    fn join(&self, channel: &str);

    fn say(&self, target: &str, message: &str);

    fn part(&self, target: &str, reason: &str);

    /// Leaves the network. Consumes the handle so the connection can be
    /// released at most once.
    fn quit(self, reason: &str);
}
