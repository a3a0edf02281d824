//! Session bridge actor: one per client connection.
//!
//! Each bridge runs in its own Tokio task and owns everything about its
//! session: the state machine, the identity, and the upstream chat handle.
//! Client commands and upstream events both arrive on channels and are
//! handled one at a time by that task, so a `close` event racing a `quit`
//! command can never observe a half-updated session.
//!
//! ```text
//!   Idle ──(connect)──→ Connecting ──(registered)──→ Active
//!                           │                           │
//!                           └─────(close / timeout)─────┴──→ Closed
//! ```
//!
//! Client-stream closure moves any state to `Closed`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ircbridge_protocol::{ClientCommand, CloseEvent, Notification};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::upstream::{ChatClient, ChatConnector, ConnectParams, UpstreamEvent};
use crate::{PeerRegistry, SessionError};

/// Upstream host used when none is configured.
pub const DEFAULT_UPSTREAM_HOST: &str = "irc.ppy.sh";

/// Upstream port used when none is configured.
pub const DEFAULT_UPSTREAM_PORT: u16 = 6667;

/// How long `Connecting` may last before the session gives up.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Quit reason when the client sends `quit` without a message.
pub const DEFAULT_QUIT_REASON: &str = "Client quit";

/// Quit reason when the client's stream goes away.
pub const CLIENT_DISCONNECTED: &str = "client disconnected";

/// Client input channel size. The reader waits when the bridge falls behind.
const INPUT_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Configuration and public types
// ---------------------------------------------------------------------------

/// Settings shared by every session bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Chat network host every session connects to.
    pub upstream_host: String,
    pub upstream_port: u16,
    /// Upper bound on `Connecting`. `None`, or a timeout too large to
    /// schedule, waits forever.
    pub handshake_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            upstream_host: DEFAULT_UPSTREAM_HOST.to_string(),
            upstream_port: DEFAULT_UPSTREAM_PORT,
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

/// Lifecycle state of a session bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Client stream open, no upstream connection yet.
    Idle,
    /// Upstream handshake in progress.
    Connecting,
    /// Upstream registration confirmed.
    Active,
    /// Terminal.
    Closed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Something that happened on the client side of the bridge.
#[derive(Debug)]
pub enum ClientInput {
    /// A decoded command.
    Command(ClientCommand),
    /// A frame that could not be decoded.
    Malformed,
    /// The client stream is gone.
    Closed,
}

/// Channel the bridge pushes client notifications into, in order.
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

// ---------------------------------------------------------------------------
// BridgeHandle
// ---------------------------------------------------------------------------

/// Handle to a running bridge actor, held by the connection handler.
pub struct BridgeHandle {
    sender: mpsc::Sender<ClientInput>,
    task: JoinHandle<BridgeState>,
}

impl BridgeHandle {
    /// Delivers client input to the bridge.
    ///
    /// # Errors
    /// [`SessionError::BridgeClosed`] once the bridge has stopped.
    pub async fn send(&self, input: ClientInput) -> Result<(), SessionError> {
        self.sender
            .send(input)
            .await
            .map_err(|_| SessionError::BridgeClosed)
    }

    /// Resolves once the bridge has stopped (e.g. the upstream closed).
    pub async fn closed(&self) {
        self.sender.closed().await;
    }

    /// Returns `true` if the bridge has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Reports client-stream closure and waits for the bridge to stop.
    ///
    /// Safe to call after the bridge already stopped on its own.
    ///
    /// # Errors
    /// [`SessionError::TaskFailed`] if the actor task panicked.
    pub async fn finish(self) -> Result<BridgeState, SessionError> {
        // Fails only if the actor is already gone, which is fine.
        let _ = self.sender.send(ClientInput::Closed).await;
        drop(self.sender);
        self.task
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))
    }
}

/// Spawns a bridge actor for one client connection.
pub fn spawn_bridge<C: ChatConnector>(
    connector: Arc<C>,
    registry: Arc<PeerRegistry>,
    config: BridgeConfig,
    notifications: NotificationSender,
) -> BridgeHandle {
    let (tx, rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let bridge = SessionBridge {
        connector,
        registry,
        config,
        state: BridgeState::Idle,
        identity: None,
        upstream: None,
        registered: false,
        deadline: None,
        inputs: rx,
        events_tx,
        events: events_rx,
        notifications,
    };

    BridgeHandle {
        sender: tx,
        task: tokio::spawn(bridge.run()),
    }
}

// ---------------------------------------------------------------------------
// SessionBridge actor
// ---------------------------------------------------------------------------

struct SessionBridge<C: ChatConnector> {
    connector: Arc<C>,
    registry: Arc<PeerRegistry>,
    config: BridgeConfig,
    state: BridgeState,
    /// Set once by the first accepted `connect`.
    identity: Option<String>,
    /// `Some` from `connect` until quit, upstream close, or teardown.
    upstream: Option<C::Client>,
    /// Whether *this* session put `identity` into the registry.
    registered: bool,
    /// Registration deadline while `Connecting`.
    deadline: Option<Instant>,
    inputs: mpsc::Receiver<ClientInput>,
    events_tx: mpsc::UnboundedSender<UpstreamEvent>,
    events: mpsc::UnboundedReceiver<UpstreamEvent>,
    notifications: NotificationSender,
}

impl<C: ChatConnector> SessionBridge<C> {
    /// Runs the actor loop until the session is closed.
    async fn run(mut self) -> BridgeState {
        tracing::debug!("session bridge started");

        while self.state != BridgeState::Closed {
            let deadline = self.deadline;
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(ClientInput::Command(cmd)) => self.handle_command(cmd),
                    Some(ClientInput::Malformed) => {
                        self.notify(Notification::invalid_message_format());
                    }
                    Some(ClientInput::Closed) | None => {
                        self.handle_client_closed().await;
                    }
                },
                Some(event) = self.events.recv() => {
                    self.handle_upstream(event).await;
                }
                () = sleep_until_deadline(deadline) => {
                    self.handle_handshake_timeout().await;
                }
            }
        }

        tracing::debug!(identity = ?self.identity, "session bridge stopped");
        self.state
    }

    // -- Client commands --------------------------------------------------

    fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Connect { username, password } => {
                self.connect(username, password);
            }
            ClientCommand::Join { channel } => {
                if let Some(upstream) = &self.upstream {
                    upstream.join(&channel);
                } else {
                    self.ignore("join");
                }
            }
            ClientCommand::Message { target, message } => {
                if let Some(upstream) = &self.upstream {
                    upstream.say(&target, &message);
                } else {
                    self.ignore("message");
                }
            }
            ClientCommand::Part { target } => {
                if let Some(upstream) = &self.upstream {
                    upstream.part(&target, "");
                } else {
                    self.ignore("part");
                }
            }
            ClientCommand::Quit { message } => match self.upstream.take() {
                Some(upstream) => {
                    let reason = message.as_deref().unwrap_or(DEFAULT_QUIT_REASON);
                    tracing::info!(identity = ?self.identity, reason, "client quit");
                    upstream.quit(reason);
                    self.deadline = None;
                }
                None => self.ignore("quit"),
            },
            ClientCommand::Unknown => {
                tracing::debug!(identity = ?self.identity, "ignoring unknown command");
            }
        }
    }

    fn connect(
        &mut self,
        username: String,
        password: Option<secrecy::SecretString>,
    ) {
        if self.state != BridgeState::Idle {
            tracing::debug!(
                identity = ?self.identity,
                state = %self.state,
                "ignoring connect, session already started"
            );
            return;
        }

        tracing::info!(
            identity = %username,
            host = %self.config.upstream_host,
            port = self.config.upstream_port,
            "connecting upstream"
        );

        let params = ConnectParams {
            host: self.config.upstream_host.clone(),
            port: self.config.upstream_port,
            nick: username.clone(),
            password,
        };
        self.upstream =
            Some(self.connector.connect(params, self.events_tx.clone()));
        self.identity = Some(username);
        self.state = BridgeState::Connecting;
        self.deadline = self
            .config
            .handshake_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
    }

    fn ignore(&self, command: &str) {
        tracing::debug!(
            command,
            state = %self.state,
            "no upstream connection, ignoring command"
        );
    }

    // -- Upstream events --------------------------------------------------

    async fn handle_upstream(&mut self, event: UpstreamEvent) {
        match event {
            UpstreamEvent::Registered => {
                if self.state != BridgeState::Connecting || self.upstream.is_none()
                {
                    tracing::debug!(state = %self.state, "ignoring late registration");
                    return;
                }
                self.state = BridgeState::Active;
                self.deadline = None;
                if let Some(identity) = &self.identity {
                    // One hold per session, even if another session
                    // already lists the same identity.
                    self.registry.add(identity).await;
                    self.registered = true;
                    tracing::info!(%identity, "upstream registered");
                }
                self.notify(Notification::Connected);
            }
            UpstreamEvent::Message(message) => {
                self.notify(Notification::Message(message));
            }
            UpstreamEvent::Join { channel, nick } => {
                self.notify(Notification::Join { channel, nick });
            }
            UpstreamEvent::Error { message } => {
                tracing::debug!(identity = ?self.identity, error = %message, "upstream error");
                self.notify(Notification::Error { error: message });
            }
            UpstreamEvent::Closed { reason } => {
                tracing::info!(identity = ?self.identity, %reason, "upstream closed");
                // Already gone upstream: drop the handle without quitting.
                self.upstream = None;
                self.deregister().await;
                self.notify(Notification::Close {
                    event: CloseEvent { reason },
                });
                self.state = BridgeState::Closed;
            }
        }
    }

    async fn handle_handshake_timeout(&mut self) {
        tracing::info!(identity = ?self.identity, "upstream registration timed out");
        self.notify(Notification::Error {
            error: "upstream registration timed out".to_string(),
        });
        if let Some(upstream) = self.upstream.take() {
            upstream.quit("registration timed out");
        }
        self.deregister().await;
        self.notify(Notification::Close {
            event: CloseEvent {
                reason: "registration timed out".to_string(),
            },
        });
        self.deadline = None;
        self.state = BridgeState::Closed;
    }

    // -- Client stream closure --------------------------------------------

    async fn handle_client_closed(&mut self) {
        if let Some(upstream) = self.upstream.take() {
            upstream.quit(CLIENT_DISCONNECTED);
        }
        self.deregister().await;
        self.deadline = None;
        self.state = BridgeState::Closed;
        tracing::info!(identity = ?self.identity, "client stream closed");
    }

    // -- Helpers ----------------------------------------------------------

    /// Releases this session's hold on its identity, if it took one.
    async fn deregister(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        if let Some(identity) = &self.identity {
            self.registry.remove(identity).await;
        }
    }

    /// Queues a notification. Dropped silently if the writer is gone.
    fn notify(&self, notification: Notification) {
        let _ = self.notifications.send(notification);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_default_targets_bancho() {
        let config = BridgeConfig::default();
        assert_eq!(config.upstream_host, "irc.ppy.sh");
        assert_eq!(config.upstream_port, 6667);
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_bridge_state_display() {
        assert_eq!(BridgeState::Connecting.to_string(), "connecting");
        assert_eq!(BridgeState::Closed.to_string(), "closed");
    }
}
