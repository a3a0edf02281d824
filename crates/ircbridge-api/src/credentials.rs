//! OAuth 2.0 client-credentials exchange against the osu! token endpoint.

use std::fmt;

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};

use crate::{CredentialExchange, TokenError, TokenGrant};

/// Token endpoint used when none is configured.
pub const DEFAULT_TOKEN_URL: &str = "https://osu.ppy.sh/oauth/token";

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "public";

/// Client-credentials grant: posts the client id and secret, gets back a
/// bearer token.
#[derive(Clone)]
pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
    scope: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

impl ClientCredentials {
    /// Creates an exchange posting to `token_url` with the default scope.
    ///
    /// # Errors
    /// [`TokenError::Configuration`] if `token_url` doesn't parse.
    pub fn new(
        http: reqwest::Client,
        token_url: &str,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self, TokenError> {
        let token_url = Url::parse(token_url).map_err(|e| {
            TokenError::Configuration(format!("invalid token URL {token_url:?}: {e}"))
        })?;

        Ok(Self {
            http,
            token_url,
            client_id: client_id.into(),
            client_secret,
            scope: DEFAULT_SCOPE.to_string(),
        })
    }

    /// Sets the requested scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

impl CredentialExchange for ClientCredentials {
    async fn exchange(&self) -> Result<TokenGrant, TokenError> {
        tracing::debug!(
            client_id = %self.client_id,
            url = %self.token_url,
            "requesting api token"
        );

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenError::RefreshFailed(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "token endpoint rejected the exchange");
            return Err(TokenError::RefreshFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let grant: TokenGrant = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to parse token response");
            TokenError::RefreshFailed(format!("invalid token response: {e}"))
        })?;

        tracing::debug!(expires_in_secs = grant.expires_in, "api token issued");
        Ok(grant)
    }
}
