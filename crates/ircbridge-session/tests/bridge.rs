//! Integration tests for the session bridge actor, driven through a fake
//! chat connector.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ircbridge_protocol::{
    ChatMessage, ClientCommand, CloseEvent, MessageKind, Notification,
};
use ircbridge_session::{
    spawn_bridge, BridgeConfig, BridgeHandle, BridgeState, ChatClient,
    ChatConnector, ClientInput, ConnectParams, PeerRegistry, UpstreamEvent,
    UpstreamEvents,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

// =========================================================================
// Fake connector
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Connect {
        host: String,
        port: u16,
        nick: String,
        password: Option<String>,
    },
    Join(String),
    Say(String, String),
    Part(String),
    Quit(String),
}

/// Records every upstream call and hands the test each session's event
/// sender so it can script the network side.
struct FakeConnector {
    calls: Arc<Mutex<Vec<Call>>>,
    upstreams: mpsc::UnboundedSender<UpstreamEvents>,
}

struct FakeClient {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ChatConnector for FakeConnector {
    type Client = FakeClient;

    fn connect(&self, params: ConnectParams, events: UpstreamEvents) -> FakeClient {
        self.calls.lock().unwrap().push(Call::Connect {
            host: params.host,
            port: params.port,
            nick: params.nick,
            password: params
                .password
                .map(|p| p.expose_secret().to_string()),
        });
        let _ = self.upstreams.send(events);
        FakeClient {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl ChatClient for FakeClient {
    fn join(&self, channel: &str) {
        self.calls.lock().unwrap().push(Call::Join(channel.into()));
    }

    fn say(&self, target: &str, message: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Say(target.into(), message.into()));
    }

    fn part(&self, target: &str, _reason: &str) {
        self.calls.lock().unwrap().push(Call::Part(target.into()));
    }

    fn quit(self, reason: &str) {
        self.calls.lock().unwrap().push(Call::Quit(reason.into()));
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct Harness {
    handle: Option<BridgeHandle>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    upstreams: mpsc::UnboundedReceiver<UpstreamEvents>,
    calls: Arc<Mutex<Vec<Call>>>,
    registry: Arc<PeerRegistry>,
}

impl Harness {
    fn start(config: BridgeConfig) -> Self {
        Self::start_with_registry(config, Arc::new(PeerRegistry::new()))
    }

    fn start_with_registry(
        config: BridgeConfig,
        registry: Arc<PeerRegistry>,
    ) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (upstreams_tx, upstreams) = mpsc::unbounded_channel();
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        let connector = Arc::new(FakeConnector {
            calls: Arc::clone(&calls),
            upstreams: upstreams_tx,
        });
        let handle = spawn_bridge(
            connector,
            Arc::clone(&registry),
            config,
            notify_tx,
        );
        Self {
            handle: Some(handle),
            notifications,
            upstreams,
            calls,
            registry,
        }
    }

    fn handle(&self) -> &BridgeHandle {
        self.handle.as_ref().expect("bridge already finished")
    }

    /// Closes the client side and waits for the bridge to stop.
    async fn finish(&mut self) -> BridgeState {
        self.handle
            .take()
            .expect("bridge already finished")
            .finish()
            .await
            .expect("bridge task should not fail")
    }

    async fn command(&self, cmd: ClientCommand) {
        self.handle()
            .send(ClientInput::Command(cmd))
            .await
            .expect("bridge should accept input");
    }

    /// Sends `connect` and returns the upstream event sender.
    async fn connect(&mut self, username: &str) -> UpstreamEvents {
        self.command(ClientCommand::Connect {
            username: username.into(),
            password: Some(SecretString::from("hunter2")),
        })
        .await;
        self.upstreams.recv().await.expect("connector should be called")
    }

    /// Connects and completes registration.
    async fn connect_active(&mut self, username: &str) -> UpstreamEvents {
        let events = self.connect(username).await;
        events.send(UpstreamEvent::Registered).unwrap();
        assert_eq!(self.next().await, Notification::Connected);
        events
    }

    async fn next(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), self.notifications.recv())
            .await
            .expect("notification should arrive")
            .expect("notification channel open")
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn quits(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Quit(_)))
            .count()
    }
}

fn config() -> BridgeConfig {
    BridgeConfig {
        upstream_host: "irc.test".into(),
        upstream_port: 6667,
        handshake_timeout: None,
    }
}

fn privmsg(nick: &str, target: &str, text: &str) -> ChatMessage {
    ChatMessage {
        kind: MessageKind::Privmsg,
        nick: nick.into(),
        ident: Some(nick.into()),
        hostname: Some("ppy.sh".into()),
        target: target.into(),
        message: text.into(),
    }
}

// =========================================================================
// Idle
// =========================================================================

#[tokio::test]
async fn test_commands_before_connect_are_ignored() {
    let mut h = Harness::start(config());

    h.command(ClientCommand::Join { channel: "#osu".into() }).await;
    h.command(ClientCommand::Message {
        target: "#osu".into(),
        message: "hi".into(),
    })
    .await;
    h.command(ClientCommand::Part { target: "#osu".into() }).await;
    h.command(ClientCommand::Quit { message: None }).await;

    let state = h.finish().await;

    assert_eq!(state, BridgeState::Closed);
    assert!(h.calls().is_empty());
    assert!(h.notifications.recv().await.is_none());
}

#[tokio::test]
async fn test_malformed_input_replies_error_and_keeps_state() {
    let mut h = Harness::start(config());

    h.handle().send(ClientInput::Malformed).await.unwrap();
    assert_eq!(
        h.next().await,
        Notification::Error {
            error: "invalid message format".into()
        }
    );

    // Still Idle: a connect afterwards is accepted.
    h.connect("alice").await;
    assert!(matches!(h.calls()[0], Call::Connect { .. }));
}

#[tokio::test]
async fn test_unknown_command_is_ignored() {
    let mut h = Harness::start(config());

    h.command(ClientCommand::Unknown).await;
    let events = h.connect_active("alice").await;
    drop(events);

    h.finish().await;
    assert_eq!(h.quits(), 1);
}

// =========================================================================
// Connecting / Active
// =========================================================================

#[tokio::test]
async fn test_connect_uses_configured_upstream_and_password() {
    let mut h = Harness::start(config());

    h.connect("alice").await;

    assert_eq!(
        h.calls(),
        vec![Call::Connect {
            host: "irc.test".into(),
            port: 6667,
            nick: "alice".into(),
            password: Some("hunter2".into()),
        }]
    );
}

#[tokio::test]
async fn test_registered_adds_identity_and_notifies_connected() {
    let mut h = Harness::start(config());

    let events = h.connect("alice").await;
    assert!(!h.registry.contains("alice").await);

    events.send(UpstreamEvent::Registered).unwrap();

    assert_eq!(h.next().await, Notification::Connected);
    assert_eq!(h.registry.list().await, vec!["alice"]);
}

#[tokio::test]
async fn test_second_connect_is_ignored() {
    let mut h = Harness::start(config());
    let _events = h.connect_active("alice").await;

    h.command(ClientCommand::Connect {
        username: "bob".into(),
        password: None,
    })
    .await;
    h.finish().await;

    let connects = h
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Connect { .. }))
        .count();
    assert_eq!(connects, 1);
    assert!(!h.registry.contains("bob").await);
}

#[tokio::test]
async fn test_active_commands_are_forwarded_in_order() {
    let mut h = Harness::start(config());
    let _events = h.connect_active("alice").await;

    h.command(ClientCommand::Join { channel: "#osu".into() }).await;
    h.command(ClientCommand::Message {
        target: "#osu".into(),
        message: "hello".into(),
    })
    .await;
    h.command(ClientCommand::Part { target: "#osu".into() }).await;
    h.finish().await;

    assert_eq!(
        &h.calls()[1..],
        &[
            Call::Join("#osu".into()),
            Call::Say("#osu".into(), "hello".into()),
            Call::Part("#osu".into()),
            Call::Quit("client disconnected".into()),
        ]
    );
}

#[tokio::test]
async fn test_upstream_events_are_forwarded_in_order() {
    let mut h = Harness::start(config());
    let events = h.connect_active("alice").await;

    events
        .send(UpstreamEvent::Message(privmsg("bob", "#osu", "hey")))
        .unwrap();
    events
        .send(UpstreamEvent::Join {
            channel: "#osu".into(),
            nick: "carol".into(),
        })
        .unwrap();
    events
        .send(UpstreamEvent::Error {
            message: "No such channel".into(),
        })
        .unwrap();

    assert_eq!(
        h.next().await,
        Notification::Message(privmsg("bob", "#osu", "hey"))
    );
    assert_eq!(
        h.next().await,
        Notification::Join {
            channel: "#osu".into(),
            nick: "carol".into()
        }
    );
    assert_eq!(
        h.next().await,
        Notification::Error {
            error: "No such channel".into()
        }
    );

    // Errors don't end the session.
    assert!(!h.handle().is_closed());
    assert!(h.registry.contains("alice").await);
}

// =========================================================================
// Quit and close
// =========================================================================

#[tokio::test]
async fn test_quit_without_message_uses_default_reason() {
    let mut h = Harness::start(config());
    let _events = h.connect_active("alice").await;

    h.command(ClientCommand::Quit { message: None }).await;
    h.finish().await;

    assert_eq!(h.calls().last(), Some(&Call::Quit("Client quit".into())));
    assert_eq!(h.quits(), 1);
}

#[tokio::test]
async fn test_quit_with_message_is_relayed_once() {
    let mut h = Harness::start(config());
    let _events = h.connect_active("alice").await;

    h.command(ClientCommand::Quit {
        message: Some("bye".into()),
    })
    .await;
    h.command(ClientCommand::Quit { message: None }).await;
    h.finish().await;

    assert_eq!(h.quits(), 1);
    assert_eq!(h.calls().last(), Some(&Call::Quit("bye".into())));
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_upstream_close_deregisters_and_ends_session() {
    let mut h = Harness::start(config());
    let events = h.connect_active("alice").await;

    events
        .send(UpstreamEvent::Closed {
            reason: "Connection reset".into(),
        })
        .unwrap();

    assert_eq!(
        h.next().await,
        Notification::Close {
            event: CloseEvent {
                reason: "Connection reset".into()
            }
        }
    );
    h.handle().closed().await;
    assert!(h.registry.is_empty().await);

    // The upstream was already gone; no quit is sent afterwards.
    h.finish().await;
    assert_eq!(h.quits(), 0);
}

#[tokio::test]
async fn test_client_close_quits_upstream_and_deregisters() {
    let mut h = Harness::start(config());
    let _events = h.connect_active("alice").await;

    let state = h.finish().await;

    assert_eq!(state, BridgeState::Closed);
    assert_eq!(h.calls().last(), Some(&Call::Quit("client disconnected".into())));
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_close_before_registration_keeps_other_sessions_identity() {
    let registry = Arc::new(PeerRegistry::new());
    registry.add("alice").await;
    let mut h = Harness::start_with_registry(config(), Arc::clone(&registry));

    let events = h.connect("alice").await;
    events
        .send(UpstreamEvent::Closed {
            reason: "Bad authentication token.".into(),
        })
        .unwrap();

    assert!(matches!(h.next().await, Notification::Close { .. }));
    h.handle().closed().await;
    assert!(registry.contains("alice").await);
}

#[tokio::test]
async fn test_registration_after_quit_is_ignored() {
    let mut h = Harness::start(config());
    let events = h.connect("alice").await;

    h.command(ClientCommand::Quit { message: None }).await;
    // Inputs are handled in order: once the error reply arrives the quit
    // has been processed.
    h.handle().send(ClientInput::Malformed).await.unwrap();
    assert!(matches!(h.next().await, Notification::Error { .. }));

    events.send(UpstreamEvent::Registered).unwrap();
    events
        .send(UpstreamEvent::Closed {
            reason: "quit".into(),
        })
        .unwrap();

    assert!(matches!(h.next().await, Notification::Close { .. }));
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_stale_session_close_keeps_reconnected_identity() {
    let registry = Arc::new(PeerRegistry::new());
    let mut old = Harness::start_with_registry(config(), Arc::clone(&registry));
    let mut new = Harness::start_with_registry(config(), Arc::clone(&registry));

    let old_events = old.connect_active("alice").await;
    let _new_events = new.connect_active("alice").await;
    assert_eq!(registry.list().await, vec!["alice"]);

    old_events
        .send(UpstreamEvent::Closed {
            reason: "Connection reset".into(),
        })
        .unwrap();
    assert!(matches!(old.next().await, Notification::Close { .. }));
    old.handle().closed().await;

    // The reconnected session is still live.
    assert_eq!(registry.list().await, vec!["alice"]);

    new.finish().await;
    assert!(registry.is_empty().await);
}

// =========================================================================
// Registration timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_registration_timeout_quits_and_closes() {
    let mut h = Harness::start(BridgeConfig {
        handshake_timeout: Some(Duration::from_secs(1)),
        ..config()
    });
    let _events = h.connect("alice").await;

    assert_eq!(
        h.next().await,
        Notification::Error {
            error: "upstream registration timed out".into()
        }
    );
    assert!(matches!(h.next().await, Notification::Close { .. }));
    h.handle().closed().await;
    assert_eq!(h.calls().last(), Some(&Call::Quit("registration timed out".into())));
    assert!(h.registry.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_registration_timeout_disarmed_once_active() {
    let mut h = Harness::start(BridgeConfig {
        handshake_timeout: Some(Duration::from_secs(30)),
        ..config()
    });
    let _events = h.connect_active("alice").await;

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(!h.handle().is_closed());
    assert!(h.notifications.try_recv().is_err());
    assert!(h.registry.contains("alice").await);
}

#[tokio::test(start_paused = true)]
async fn test_quit_while_connecting_disarms_registration_timeout() {
    let mut h = Harness::start(BridgeConfig {
        handshake_timeout: Some(Duration::from_secs(1)),
        ..config()
    });
    let events = h.connect("alice").await;

    h.command(ClientCommand::Quit { message: None }).await;
    h.handle().send(ClientInput::Malformed).await.unwrap();
    assert!(matches!(h.next().await, Notification::Error { .. }));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.notifications.try_recv().is_err());
    assert_eq!(h.quits(), 1);

    events
        .send(UpstreamEvent::Closed {
            reason: "quit".into(),
        })
        .unwrap();
    assert_eq!(
        h.next().await,
        Notification::Close {
            event: CloseEvent {
                reason: "quit".into()
            }
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unschedulable_registration_timeout_waits_forever() {
    let mut h = Harness::start(BridgeConfig {
        handshake_timeout: Some(Duration::MAX),
        ..config()
    });
    let events = h.connect("alice").await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(!h.handle().is_closed());

    events.send(UpstreamEvent::Registered).unwrap();
    assert_eq!(h.next().await, Notification::Connected);
}
