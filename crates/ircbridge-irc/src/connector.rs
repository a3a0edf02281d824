//! The production [`ChatConnector`]: one TCP connection per session.
//!
//! `connect` spawns a connection task and hands back an [`IrcClient`]
//! right away. The task owns the socket; the client only queues outgoing
//! lines on an unbounded channel, so the bridge never waits on the network.
//!
//! ```text
//!   IrcClient ──(Outgoing)──→ connection task ──→ TCP ──→ IRC server
//!   bridge   ←─(UpstreamEvent)──┘          ←── lines ←──┘
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ircbridge_protocol::{ChatMessage, MessageKind};
use ircbridge_session::{
    ChatClient, ChatConnector, ConnectParams, UpstreamEvent, UpstreamEvents,
    CLIENT_DISCONNECTED,
};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::codec::IrcCodec;
use crate::message::{
    join_line, part_line, privmsg_lines, quit_line, strip_line_breaks, IrcLine,
};
use crate::IrcError;

/// How long to wait for the server to hang up after `QUIT`.
pub const DEFAULT_QUIT_GRACE: Duration = Duration::from_secs(5);

const CTCP_DELIM: char = '\x01';

// ---------------------------------------------------------------------------
// IrcConnector / IrcClient
// ---------------------------------------------------------------------------

/// Opens plain-TCP IRC connections.
#[derive(Debug, Clone)]
pub struct IrcConnector {
    quit_grace: Duration,
}

impl IrcConnector {
    pub fn new() -> Self {
        Self {
            quit_grace: DEFAULT_QUIT_GRACE,
        }
    }

    /// Sets how long a quitting connection waits for the server to close.
    pub fn with_quit_grace(mut self, grace: Duration) -> Self {
        self.quit_grace = grace;
        self
    }
}

impl Default for IrcConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatConnector for IrcConnector {
    type Client = IrcClient;

    fn connect(&self, params: ConnectParams, events: UpstreamEvents) -> IrcClient {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(params, events, rx, self.quit_grace));
        IrcClient { commands: tx }
    }
}

/// What the client handle asks the connection task to do.
#[derive(Debug)]
enum Outgoing {
    Line(String),
    Quit(String),
}

/// Handle for one IRC connection. Dropping it without `quit` still
/// makes the task send `QUIT` and wind down.
#[derive(Debug)]
pub struct IrcClient {
    commands: mpsc::UnboundedSender<Outgoing>,
}

impl IrcClient {
    fn queue(&self, outgoing: Outgoing) {
        // A closed channel means the connection task is gone, and the
        // session hears about that through its `Closed` event.
        let _ = self.commands.send(outgoing);
    }
}

impl ChatClient for IrcClient {
    fn join(&self, channel: &str) {
        self.queue(Outgoing::Line(join_line(channel)));
    }

    fn say(&self, target: &str, message: &str) {
        for line in privmsg_lines(target, message) {
            self.queue(Outgoing::Line(line));
        }
    }

    fn part(&self, target: &str, reason: &str) {
        self.queue(Outgoing::Line(part_line(target, reason)));
    }

    fn quit(self, reason: &str) {
        self.queue(Outgoing::Quit(reason.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

async fn run_connection(
    params: ConnectParams,
    events: UpstreamEvents,
    commands: mpsc::UnboundedReceiver<Outgoing>,
    quit_grace: Duration,
) {
    let nick = params.nick.clone();

    let reason = match drive(params, &events, commands, quit_grace).await {
        Ok(reason) => reason,
        Err(e) => {
            tracing::debug!(%nick, error = %e, "irc connection failed");
            e.to_string()
        }
    };

    tracing::info!(%nick, %reason, "irc connection closed");
    let _ = events.send(UpstreamEvent::Closed { reason });
}

/// Runs the connection until it ends. `Ok` carries the close reason.
async fn drive(
    params: ConnectParams,
    events: &UpstreamEvents,
    mut commands: mpsc::UnboundedReceiver<Outgoing>,
    quit_grace: Duration,
) -> Result<String, IrcError> {
    let stream = TcpStream::connect((params.host.as_str(), params.port)).await?;
    let mut framed = Framed::new(stream, IrcCodec::new());

    for line in registration_lines(&params) {
        framed.send(line).await?;
    }
    tracing::debug!(nick = %params.nick, host = %params.host, "irc registration sent");

    let mut last_error: Option<String> = None;
    let mut quit_deadline: Option<Instant> = None;

    loop {
        let deadline = quit_deadline;
        tokio::select! {
            frame = framed.next() => match frame {
                Some(line) => {
                    let line = line?;
                    if let Some(reply) = handle_line(&line, events, &mut last_error) {
                        framed.send(reply).await?;
                    }
                }
                None => {
                    return Ok(last_error.unwrap_or_else(|| "connection closed".to_string()));
                }
            },
            outgoing = commands.recv(), if deadline.is_none() => {
                let reason = match outgoing {
                    Some(Outgoing::Line(line)) => {
                        framed.send(line).await?;
                        continue;
                    }
                    Some(Outgoing::Quit(reason)) => reason,
                    None => CLIENT_DISCONNECTED.to_string(),
                };
                framed.send(quit_line(&reason)).await?;
                quit_deadline = Some(Instant::now() + quit_grace);
            }
            () = sleep_until_deadline(deadline) => {
                return Ok(last_error.unwrap_or_else(|| "quit".to_string()));
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// `PASS` (when a password is set), `NICK`, and `USER`.
fn registration_lines(params: &ConnectParams) -> Vec<String> {
    let nick = strip_line_breaks(&params.nick);
    let mut lines = Vec::with_capacity(3);

    if let Some(password) = &params.password {
        let password = password.expose_secret();
        if !password.is_empty() {
            lines.push(format!("PASS {}", strip_line_breaks(password)));
        }
    }
    lines.push(format!("NICK {nick}"));
    lines.push(format!("USER {nick} 0 * :{nick}"));
    lines
}

// ---------------------------------------------------------------------------
// Inbound lines
// ---------------------------------------------------------------------------

/// Maps one inbound line to session events. Returns a reply to send, if any.
fn handle_line(
    raw: &str,
    events: &UpstreamEvents,
    last_error: &mut Option<String>,
) -> Option<String> {
    let line = IrcLine::parse(raw)?;
    let emit = |event| {
        let _ = events.send(event);
    };

    match line.command.as_str() {
        "PING" => {
            return Some(format!("PONG :{}", line.param(0).unwrap_or_default()));
        }
        "001" => emit(UpstreamEvent::Registered),
        "PRIVMSG" | "NOTICE" => {
            if let Some(message) = chat_message(&line) {
                emit(UpstreamEvent::Message(message));
            }
        }
        "JOIN" => {
            if let (Some(channel), Some(nick)) = (line.param(0), line.nick()) {
                emit(UpstreamEvent::Join {
                    channel: channel.to_string(),
                    nick: nick.to_string(),
                });
            }
        }
        "ERROR" => {
            let message = line.params.last().cloned().unwrap_or_default();
            *last_error = Some(message.clone());
            emit(UpstreamEvent::Error { message });
        }
        _ => {
            if line.numeric().is_some_and(|code| (400..600).contains(&code)) {
                let message = line.params.last().cloned().unwrap_or_default();
                tracing::debug!(command = %line.command, %message, "irc error reply");
                emit(UpstreamEvent::Error { message });
            }
        }
    }
    None
}

/// Builds a chat message from `PRIVMSG`/`NOTICE`. CTCP other than
/// `ACTION` yields `None`.
fn chat_message(line: &IrcLine) -> Option<ChatMessage> {
    let target = line.param(0)?;
    let text = line.param(1)?;
    let nick = line.nick()?;

    let mut kind = if line.command == "NOTICE" {
        MessageKind::Notice
    } else {
        MessageKind::Privmsg
    };
    let mut message = text;

    if let Some(ctcp) = text.strip_prefix(CTCP_DELIM) {
        let ctcp = ctcp.strip_suffix(CTCP_DELIM).unwrap_or(ctcp);
        let body = match ctcp.split_once(' ') {
            Some(("ACTION", body)) => body,
            None if ctcp == "ACTION" => "",
            _ => return None,
        };
        if kind != MessageKind::Privmsg {
            return None;
        }
        kind = MessageKind::Action;
        message = body;
    }

    Some(ChatMessage {
        kind,
        nick: nick.to_string(),
        ident: line.ident().map(str::to_string),
        hostname: line.host().map(str::to_string),
        target: target.to_string(),
        message: message.to_string(),
    })
}
