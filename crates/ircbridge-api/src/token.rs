//! Single-flight cache for the API bearer token.
//!
//! Every match lookup needs a bearer token, and tokens are fetched through
//! a [`CredentialExchange`]. The cache hands out the stored token while it
//! is fresh and makes sure that, however many requests find it stale at
//! once, only one exchange is in flight.
//!
//! # How a refresh runs
//!
//! ```text
//!   caller A ──┐                       ┌──→ Ok(token) / Err(e)
//!   caller B ──┼── Shared<refresh> ────┼──→ Ok(token) / Err(e)
//!   caller C ──┘        │              └──→ Ok(token) / Err(e)
//!                       └── tokio::spawn(exchange + store)
//! ```
//!
//! The exchange runs on its own task, so a caller that gives up (say its
//! HTTP request was cancelled) doesn't cancel the refresh for the others.
//! The task stores the result before the waiters wake up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::TokenError;

/// Tokens are treated as expired this long before their real expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A freshly issued token, as returned by the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Lifetime in seconds, counted from issue.
    pub expires_in: u64,
}

/// Source of new tokens.
pub trait CredentialExchange: Send + Sync + 'static {
    /// Performs one exchange. Called by the cache at most once at a time.
    fn exchange(&self) -> impl Future<Output = Result<TokenGrant, TokenError>> + Send;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<SecretString, TokenError>>>;

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    token: Option<CachedToken>,
    in_flight: Option<RefreshFuture>,
}

/// Process-wide token cache. Share it with `Arc`.
pub struct TokenCache<E> {
    exchange: Arc<E>,
    state: Arc<Mutex<CacheState>>,
    margin: Duration,
}

impl<E: CredentialExchange> TokenCache<E> {
    /// Creates an empty cache; the first call to
    /// [`get_valid_token`](Self::get_valid_token) fetches a token.
    pub fn new(exchange: E) -> Self {
        Self {
            exchange: Arc::new(exchange),
            state: Arc::new(Mutex::new(CacheState::default())),
            margin: EXPIRY_MARGIN,
        }
    }

    /// Overrides the expiry margin.
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Returns a token that stays valid for at least the margin.
    ///
    /// Starts a refresh if the cached token is missing or stale, or joins
    /// the refresh already in flight.
    ///
    /// # Errors
    /// The refresh's [`TokenError`], delivered to every caller that waited
    /// on it. Nothing is cached on failure, so the next call tries again.
    pub async fn get_valid_token(&self) -> Result<SecretString, TokenError> {
        let refresh = {
            let mut state = self.state.lock().await;

            if let Some(cached) = &state.token {
                if Instant::now() < cached.expires_at {
                    return Ok(cached.token.clone());
                }
            }

            match state.in_flight.clone() {
                Some(refresh) => refresh,
                None => {
                    tracing::debug!("cached token missing or stale, refreshing");
                    let refresh = self.start_refresh();
                    state.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn start_refresh(&self) -> RefreshFuture {
        let exchange = Arc::clone(&self.exchange);
        let state = Arc::clone(&self.state);
        let margin = self.margin;

        let task = tokio::spawn(async move {
            let result = fetch(exchange.as_ref(), margin).await;

            let mut state = state.lock().await;
            state.in_flight = None;
            match result {
                Ok(cached) => {
                    let token = cached.token.clone();
                    state.token = Some(cached);
                    tracing::info!("api token refreshed");
                    Ok(token)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "api token refresh failed");
                    Err(e)
                }
            }
        });

        let cleanup = Arc::clone(&self.state);
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    // The task died before it could clear the slot itself.
                    cleanup.lock().await.in_flight = None;
                    tracing::warn!(error = %e, "api token refresh task failed");
                    Err(TokenError::RefreshFailed(format!("refresh task failed: {e}")))
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Runs one exchange and works out when its token goes stale.
async fn fetch<E: CredentialExchange>(
    exchange: &E,
    margin: Duration,
) -> Result<CachedToken, TokenError> {
    let fetched_at = Instant::now();
    let grant = exchange.exchange().await?;

    let lifetime = Duration::from_secs(grant.expires_in);
    if lifetime <= margin {
        return Err(TokenError::RefreshFailed(format!(
            "token lifetime of {}s does not exceed the {}s margin",
            lifetime.as_secs(),
            margin.as_secs()
        )));
    }

    let expires_at = fetched_at.checked_add(lifetime - margin).ok_or_else(|| {
        TokenError::RefreshFailed(format!(
            "token lifetime of {}s is out of range",
            lifetime.as_secs()
        ))
    })?;

    Ok(CachedToken {
        token: grant.access_token,
        expires_at,
    })
}
