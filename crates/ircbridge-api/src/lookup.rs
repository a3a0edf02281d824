//! Authenticated match lookups against the osu! API.
//!
//! The gateway doesn't interpret what the API says: whatever status and
//! body come back are handed to the caller as a [`MatchResponse`].

use std::sync::Arc;

use reqwest::Url;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::{CredentialExchange, LookupError, TokenCache};

/// API base used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://osu.ppy.sh/api/v2";

/// The match API's answer, passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResponse {
    pub status: u16,
    /// Decoded JSON body; a non-JSON body arrives as a JSON string.
    pub body: Value,
}

/// Looks up multiplayer matches with a cached bearer token.
pub struct MatchLookup<E> {
    http: reqwest::Client,
    api_base: Url,
    tokens: Arc<TokenCache<E>>,
}

impl<E: CredentialExchange> MatchLookup<E> {
    /// # Errors
    /// [`LookupError::Configuration`] if `api_base` isn't a usable base URL.
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        tokens: Arc<TokenCache<E>>,
    ) -> Result<Self, LookupError> {
        let api_base = Url::parse(api_base).map_err(|e| {
            LookupError::Configuration(format!("invalid API base {api_base:?}: {e}"))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(LookupError::Configuration(format!(
                "API base {api_base} cannot carry a path"
            )));
        }

        Ok(Self {
            http,
            api_base,
            tokens,
        })
    }

    /// Fetches `{api_base}/matches/{match_id}`.
    ///
    /// # Errors
    /// - [`LookupError::Token`] if no token could be obtained
    /// - [`LookupError::Upstream`] if the API never answered
    pub async fn lookup_match(&self, match_id: &str) -> Result<MatchResponse, LookupError> {
        let token = self.tokens.get_valid_token().await?;
        let url = self.match_url(match_id)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%match_id, error = %e, "match lookup failed");
                LookupError::Upstream(e.to_string())
            })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LookupError::Upstream(e.to_string()))?;

        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        tracing::debug!(%match_id, status, "match lookup answered");
        Ok(MatchResponse { status, body })
    }

    /// Appends `matches/<id>` with the id as a single encoded segment.
    fn match_url(&self, match_id: &str) -> Result<Url, LookupError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                LookupError::Configuration("API base cannot carry a path".to_string())
            })?
            .pop_if_empty()
            .push("matches")
            .push(match_id);
        Ok(url)
    }
}
