//! Server configuration, loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `BIND_ADDRESS` | `0.0.0.0:3000` |
//! | `IRC_HOST` | `irc.ppy.sh` |
//! | `IRC_PORT` | `6667` |
//! | `IRC_HANDSHAKE_TIMEOUT_SECS` | `30` (`0` disables) |
//! | `OSU_CLIENT_ID` / `OSU_CLIENT_SECRET` | unset: match lookup disabled |
//! | `OSU_TOKEN_URL` | `https://osu.ppy.sh/oauth/token` |
//! | `OSU_API_BASE` | `https://osu.ppy.sh/api/v2` |
//! | `OSU_API_SCOPE` | `public` |

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use ircbridge_api::{DEFAULT_API_BASE, DEFAULT_SCOPE, DEFAULT_TOKEN_URL};
use ircbridge_session::{
    BridgeConfig, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_UPSTREAM_HOST,
    DEFAULT_UPSTREAM_PORT,
};
use secrecy::SecretString;

/// Default HTTP/WebSocket listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Credentials and endpoints for the osu! API.
#[derive(Debug, Clone)]
pub struct OsuApiConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
    pub api_base: String,
    pub scope: String,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub irc_host: String,
    pub irc_port: u16,
    /// `None` waits for registration forever.
    pub handshake_timeout: Option<Duration>,
    /// `None` disables `/api/match/:match_id`.
    pub osu_api: Option<OsuApiConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            irc_host: DEFAULT_UPSTREAM_HOST.to_string(),
            irc_port: DEFAULT_UPSTREAM_PORT,
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            osu_api: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty());

        let bind_address = get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let irc_host = get("IRC_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_UPSTREAM_HOST.to_string());

        let irc_port = match get("IRC_PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| {
                ConfigError::Invalid(format!(
                    "IRC_PORT must be a port number, got '{value}': {e}"
                ))
            })?,
            None => DEFAULT_UPSTREAM_PORT,
        };

        let handshake_timeout = match get("IRC_HANDSHAKE_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value.parse::<u64>().map_err(|e| {
                    ConfigError::Invalid(format!(
                        "IRC_HANDSHAKE_TIMEOUT_SECS must be a whole number of seconds, got '{value}': {e}"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => Some(DEFAULT_HANDSHAKE_TIMEOUT),
        };

        let osu_api = match (get("OSU_CLIENT_ID"), get("OSU_CLIENT_SECRET")) {
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("OSU_CLIENT_SECRET".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("OSU_CLIENT_ID".to_string()));
            }
            (Some(client_id), Some(client_secret)) => Some(OsuApiConfig {
                client_id: client_id.clone(),
                client_secret: SecretString::from(client_secret.clone()),
                token_url: get("OSU_TOKEN_URL")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                api_base: get("OSU_API_BASE")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                scope: get("OSU_API_SCOPE")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            }),
        };

        Ok(Self {
            bind_address,
            irc_host,
            irc_port,
            handshake_timeout,
            osu_api,
        })
    }

    /// Session settings derived from this configuration.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            upstream_host: self.irc_host.clone(),
            upstream_port: self.irc_port,
            handshake_timeout: self.handshake_timeout,
        }
    }
}
