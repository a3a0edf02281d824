//! Error types for token acquisition and match lookups.

/// Errors from the token cache and credential exchange.
///
/// `Clone` so one refresh outcome can be handed to every caller waiting
/// on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// The exchange failed: network error, non-success status, malformed
    /// response, or a lifetime too short to use.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The exchange was set up wrong (e.g. an unparsable token URL).
    #[error("token configuration error: {0}")]
    Configuration(String),
}

/// Errors from [`MatchLookup`](crate::MatchLookup).
///
/// A non-success answer from the match API is not an error; it comes back
/// as a [`MatchResponse`](crate::MatchResponse) with that status.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// No token could be obtained.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The match API could not be reached or its body could not be read.
    #[error("match API request failed: {0}")]
    Upstream(String),

    /// The API base URL can't carry a path.
    #[error("lookup configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        let err = TokenError::RefreshFailed("status 401".into());
        assert_eq!(err.to_string(), "token refresh failed: status 401");
    }

    #[test]
    fn test_lookup_error_from_token_error_is_transparent() {
        let err: LookupError = TokenError::RefreshFailed("boom".into()).into();

        assert!(matches!(err, LookupError::Token(_)));
        assert_eq!(err.to_string(), "token refresh failed: boom");
    }
}
