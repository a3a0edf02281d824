//! # ircbridge
//!
//! Lets browser clients hold an IRC session over a WebSocket.
//!
//! Each WebSocket client gets its own upstream IRC connection, driven by a
//! small JSON command protocol (`connect`, `join`, `message`, `part`,
//! `quit`). Alongside the socket the server answers two HTTP endpoints:
//! a snapshot of who is logged in upstream and a passthrough lookup of
//! osu! multiplayer matches.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ircbridge::prelude::*;
//!
//! # async fn run() -> Result<(), BridgeError> {
//! let config = Config::from_env()?;
//! let server = BridgeServerBuilder::from_config(&config)
//!     .build(IrcConnector::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod routes;
mod server;

pub use config::{Config, ConfigError, OsuApiConfig, DEFAULT_BIND_ADDRESS};
pub use error::BridgeError;
pub use routes::{build_routes, AppState, LIVENESS_TEXT};
pub use server::{BridgeServer, BridgeServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{
        BridgeError, BridgeServer, BridgeServerBuilder, Config, ConfigError,
        OsuApiConfig,
    };
    pub use ircbridge_irc::IrcConnector;
    pub use ircbridge_protocol::{ChatMessage, ClientCommand, MessageKind, Notification};
    pub use ircbridge_session::{
        BridgeConfig, ChatClient, ChatConnector, ConnectParams, PeerRegistry,
        UpstreamEvent, UpstreamEvents,
    };
}
