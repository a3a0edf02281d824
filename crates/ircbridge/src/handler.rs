//! Per-connection handler: bridge spawn, frame decoding, and teardown.
//!
//! Each upgraded WebSocket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn the session bridge and a writer task for its notifications
//!   2. Loop: receive frames → decode → feed the bridge
//!   3. Stop when the client closes or the bridge finishes
//!   4. Tell the bridge the client is gone, drain the writer, close the socket

use std::sync::Arc;

use ircbridge_protocol::{ClientCommand, Codec, JsonCodec, Notification};
use ircbridge_session::{spawn_bridge, BridgeHandle, ChatConnector, ClientInput};
use ircbridge_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::routes::AppState;
use crate::BridgeError;

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection<C: ChatConnector>(
    conn: WebSocketConnection,
    state: AppState<C>,
) -> Result<(), BridgeError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let codec = JsonCodec;
    tracing::info!(%conn_id, "client connected");

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let bridge = spawn_bridge(
        Arc::clone(&state.connector),
        Arc::clone(&state.registry),
        state.bridge_config.clone(),
        notify_tx,
    );
    let writer = tokio::spawn(write_notifications(Arc::clone(&conn), notify_rx, codec));

    // --- Read loop ---
    read_frames(&conn, &bridge, &codec).await;

    // --- Teardown ---
    let bridge_state = bridge.finish().await?;
    // The bridge dropped its notification sender, so the writer drains
    // what is left and stops.
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "notification write failed"),
        Err(e) => tracing::warn!(%conn_id, error = %e, "notification writer panicked"),
    }
    let _ = conn.close().await;

    tracing::info!(%conn_id, state = %bridge_state, "client disconnected");
    Ok(())
}

/// Feeds decoded frames to the bridge until either side is done.
async fn read_frames(conn: &WebSocketConnection, bridge: &BridgeHandle, codec: &JsonCodec) {
    let conn_id = conn.id();

    loop {
        let data = tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::debug!(%conn_id, "client closed the stream");
                    return;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    return;
                }
            },
            () = bridge.closed() => {
                tracing::debug!(%conn_id, "session ended upstream");
                return;
            }
        };

        let input = match codec.decode::<ClientCommand>(&data) {
            Ok(cmd) => {
                tracing::debug!(%conn_id, command = cmd.kind(), "client command");
                ClientInput::Command(cmd)
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode client frame");
                ClientInput::Malformed
            }
        };

        if bridge.send(input).await.is_err() {
            return;
        }
    }
}

/// Encodes notifications in order and writes them as text frames.
async fn write_notifications(
    conn: Arc<WebSocketConnection>,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    codec: JsonCodec,
) -> Result<(), BridgeError> {
    while let Some(notification) = notifications.recv().await {
        let bytes = codec.encode(&notification)?;
        conn.send(&bytes).await?;
    }
    Ok(())
}
