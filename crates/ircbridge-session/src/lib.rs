//! Per-client session bridging for ircbridge.
//!
//! This crate owns everything that happens between "a client stream was
//! accepted" and "that stream is gone":
//!
//! 1. **Bridging**: one actor per client ([`spawn_bridge`]) that turns
//!    client commands into upstream chat actions and upstream events into
//!    client notifications.
//! 2. **Peer tracking**: knowing who is logged in upstream right now
//!    ([`PeerRegistry`]).
//! 3. **The upstream seam**: the [`ChatConnector`] / [`ChatClient`] traits
//!    the bridge talks to instead of a concrete IRC client.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← decodes frames, feeds ClientInput, writes Notifications
//!     ↕
//! Session (this crate)   ← state machine, registry
//!     ↕
//! Chat connector (below)   ← ircbridge-irc, or a fake in tests
//! ```

mod bridge;
mod error;
mod registry;
mod upstream;

pub use bridge::{
    spawn_bridge, BridgeConfig, BridgeHandle, BridgeState, ClientInput,
    NotificationSender, CLIENT_DISCONNECTED, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_QUIT_REASON, DEFAULT_UPSTREAM_HOST, DEFAULT_UPSTREAM_PORT,
};
pub use error::SessionError;
pub use registry::PeerRegistry;
pub use upstream::{
    ChatClient, ChatConnector, ConnectParams, UpstreamEvent, UpstreamEvents,
};
