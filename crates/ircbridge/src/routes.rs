//! HTTP routes for ircbridge.
//!
//! Defines the Axum router and application state.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ircbridge_api::{ClientCredentials, MatchLookup, MatchResponse};
use ircbridge_session::{BridgeConfig, ChatConnector, PeerRegistry};
use ircbridge_transport::{Connection, WebSocketConnection};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::handle_connection;

/// Liveness text served on plain `GET /`.
pub const LIVENESS_TEXT: &str = "IRC Proxy running";

/// Application state shared across all handlers.
pub struct AppState<C: ChatConnector> {
    /// Opens upstream chat connections for new sessions.
    pub connector: Arc<C>,

    /// Identities with an active upstream session.
    pub registry: Arc<PeerRegistry>,

    /// Settings handed to every session bridge.
    pub bridge_config: BridgeConfig,

    /// `None` when no API credentials are configured.
    pub lookup: Option<Arc<MatchLookup<ClientCredentials>>>,
}

impl<C: ChatConnector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            registry: Arc::clone(&self.registry),
            bridge_config: self.bridge_config.clone(),
            lookup: self.lookup.clone(),
        }
    }
}

/// Build the application routes.
///
/// - `/` - liveness text, or the session WebSocket on upgrade
/// - `/api/match/:match_id` - match lookup passthrough
/// - `/api/connected-users` - registry snapshot
///
/// CORS is permissive; TraceLayer logs each request.
pub fn build_routes<C: ChatConnector>(state: AppState<C>) -> Router {
    Router::new()
        .route("/", get(root::<C>))
        .route("/api/match/:match_id", get(match_details::<C>))
        .route("/api/connected-users", get(connected_users::<C>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root<C: ChatConnector>(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState<C>>,
) -> Response {
    let Some(ws) = ws else {
        return LIVENESS_TEXT.into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let conn = WebSocketConnection::new(socket);
        let conn_id = conn.id();
        if let Err(e) = handle_connection(conn, state).await {
            tracing::debug!(%conn_id, error = %e, "connection ended with error");
        }
    })
}

async fn match_details<C: ChatConnector>(
    Path(match_id): Path<String>,
    State(state): State<AppState<C>>,
) -> Response {
    let Some(lookup) = &state.lookup else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "match lookup is not configured" })),
        )
            .into_response();
    };

    match lookup.lookup_match(&match_id).await {
        Ok(MatchResponse { status, body }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(body)).into_response()
        }
        Err(e) => {
            tracing::warn!(%match_id, error = %e, "match lookup failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn connected_users<C: ChatConnector>(
    State(state): State<AppState<C>>,
) -> Json<Vec<String>> {
    Json(state.registry.list().await)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ircbridge_session::{ChatClient, ConnectParams, UpstreamEvents};
    use tower::ServiceExt;

    use super::*;

    /// Never used by these tests; HTTP routes don't open sessions.
    struct NoConnector;
    struct NoClient;

    impl ChatClient for NoClient {
        fn join(&self, _: &str) {}
        fn say(&self, _: &str, _: &str) {}
        fn part(&self, _: &str, _: &str) {}
        fn quit(self, _: &str) {}
    }

    impl ChatConnector for NoConnector {
        type Client = NoClient;
        fn connect(&self, _: ConnectParams, _: UpstreamEvents) -> NoClient {
            NoClient
        }
    }

    fn state() -> AppState<NoConnector> {
        AppState {
            connector: Arc::new(NoConnector),
            registry: Arc::new(PeerRegistry::new()),
            bridge_config: BridgeConfig::default(),
            lookup: None,
        }
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_root_without_upgrade_returns_liveness_text() {
        let (status, body) = get_body(build_routes(state()), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "IRC Proxy running");
    }

    #[tokio::test]
    async fn test_connected_users_lists_registry_sorted() {
        let state = state();
        state.registry.add("bob").await;
        state.registry.add("alice").await;

        let (status, body) = get_body(build_routes(state), "/api/connected-users").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"["alice","bob"]"#);
    }

    #[tokio::test]
    async fn test_connected_users_empty_registry_returns_empty_array() {
        let (_, body) = get_body(build_routes(state()), "/api/connected-users").await;
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn test_match_details_without_credentials_returns_503() {
        let (status, body) = get_body(build_routes(state()), "/api/match/123").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("not configured"));
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState<NoConnector>>();
    }
}
