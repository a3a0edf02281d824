//! `BridgeServer` builder and serve loop.
//!
//! This is the entry point for running the bridge. It ties together all
//! the layers: routes → handler → session → chat connector, plus the
//! optional match lookup.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ircbridge_api::{ClientCredentials, MatchLookup, TokenCache, TokenError};
use ircbridge_session::{BridgeConfig, ChatConnector, PeerRegistry};
use tokio::net::TcpListener;

use crate::routes::{build_routes, AppState};
use crate::{BridgeError, Config, OsuApiConfig};

/// Timeout for every outbound API request (token exchange and lookups).
const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for configuring and starting a bridge server.
///
/// # Example
///
/// ```rust,ignore
/// use ircbridge::prelude::*;
///
/// let server = BridgeServer::builder()
///     .bind("0.0.0.0:3000")
///     .build(IrcConnector::new())
///     .await?;
/// server.run().await
/// ```
pub struct BridgeServerBuilder {
    bind_addr: String,
    bridge_config: BridgeConfig,
    osu_api: Option<OsuApiConfig>,
}

impl BridgeServerBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Binds to an ephemeral localhost port and has no match lookup.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            bridge_config: BridgeConfig::default(),
            osu_api: None,
        }
    }

    /// Creates a builder from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.bind_address.clone(),
            bridge_config: config.bridge_config(),
            osu_api: config.osu_api.clone(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the settings every session bridge starts with.
    pub fn bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    /// Enables `/api/match/:match_id` with these credentials.
    pub fn osu_api(mut self, config: OsuApiConfig) -> Self {
        self.osu_api = Some(config);
        self
    }

    /// Binds the listener and assembles the shared state.
    ///
    /// # Errors
    /// - [`BridgeError::Token`] / [`BridgeError::Lookup`] if the API
    ///   endpoints don't parse
    /// - [`BridgeError::Io`] if the address can't be bound
    pub async fn build<C: ChatConnector>(
        self,
        connector: C,
    ) -> Result<BridgeServer<C>, BridgeError> {
        let lookup = match &self.osu_api {
            Some(osu) => Some(Arc::new(build_lookup(osu)?)),
            None => {
                tracing::info!("no API credentials configured, match lookup disabled");
                None
            }
        };

        let listener = TcpListener::bind(&self.bind_addr).await?;

        let state = AppState {
            connector: Arc::new(connector),
            registry: Arc::new(PeerRegistry::new()),
            bridge_config: self.bridge_config,
            lookup,
        };

        Ok(BridgeServer { listener, state })
    }
}

impl Default for BridgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn build_lookup(osu: &OsuApiConfig) -> Result<MatchLookup<ClientCredentials>, BridgeError> {
    let http = reqwest::Client::builder()
        .timeout(API_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| TokenError::Configuration(format!("failed to build HTTP client: {e}")))?;

    let exchange = ClientCredentials::new(
        http.clone(),
        &osu.token_url,
        osu.client_id.clone(),
        osu.client_secret.clone(),
    )?
    .with_scope(osu.scope.clone());

    let lookup = MatchLookup::new(http, &osu.api_base, Arc::new(TokenCache::new(exchange)))?;
    Ok(lookup)
}

/// A bound bridge server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct BridgeServer<C: ChatConnector> {
    listener: TcpListener,
    state: AppState<C>,
}

impl<C: ChatConnector> BridgeServer<C> {
    /// Creates a new builder.
    pub fn builder() -> BridgeServerBuilder {
        BridgeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The registry shared by every session on this server.
    pub fn registry(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), BridgeError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes, then stops accepting and waits
    /// for in-flight requests.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), BridgeError> {
        let addr = self.listener.local_addr()?;
        tracing::info!(%addr, "ircbridge listening");

        axum::serve(self.listener, build_routes(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("ircbridge stopped");
        Ok(())
    }
}
