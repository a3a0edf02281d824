//! osu! API access for ircbridge.
//!
//! Two pieces, both shared process-wide behind an `Arc`:
//!
//! - [`TokenCache`]: keeps one bearer token and refreshes it through a
//!   [`CredentialExchange`] with at most one refresh in flight.
//! - [`MatchLookup`]: answers `/api/match/:match_id` by calling the match
//!   API with that token and passing the response through.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ircbridge_api::{ClientCredentials, MatchLookup, TokenCache, DEFAULT_API_BASE, DEFAULT_TOKEN_URL};
//! use secrecy::SecretString;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let http = reqwest::Client::new();
//! let exchange = ClientCredentials::new(
//!     http.clone(),
//!     DEFAULT_TOKEN_URL,
//!     "12345",
//!     SecretString::from("client-secret"),
//! )?;
//! let lookup = MatchLookup::new(http, DEFAULT_API_BASE, Arc::new(TokenCache::new(exchange)))?;
//! let response = lookup.lookup_match("111534249").await?;
//! println!("{} {}", response.status, response.body);
//! # Ok(())
//! # }
//! ```

mod credentials;
mod error;
mod lookup;
mod token;

pub use credentials::{ClientCredentials, DEFAULT_SCOPE, DEFAULT_TOKEN_URL};
pub use error::{LookupError, TokenError};
pub use lookup::{MatchLookup, MatchResponse, DEFAULT_API_BASE};
pub use token::{CredentialExchange, TokenCache, TokenGrant, EXPIRY_MARGIN};
