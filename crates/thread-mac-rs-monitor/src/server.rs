//! Implements the web server and WebSocket logic using axum.

use crate::model::LinkSnapshot;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{Html, IntoResponse},
    routing::get,
};
use log::{error, info, trace};
use std::net::SocketAddr;
use tokio::sync::broadcast;

/// State shared by all connections: the broadcast channel fanning snapshots
/// out to every WebSocket client.
#[derive(Clone)]
pub(super) struct AppState {
    pub(super) snapshot_tx: broadcast::Sender<LinkSnapshot>,
}

pub(super) fn router(snapshot_tx: broadcast::Sender<LinkSnapshot>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(websocket_handler))
        .with_state(AppState { snapshot_tx })
}

/// Binds to `addr` and serves until the server fails.
pub(super) async fn start_web_server(
    addr: SocketAddr,
    snapshot_tx: broadcast::Sender<LinkSnapshot>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.inspect_err(|e| {
        error!("Failed to bind web server to {}: {}", addr, e);
    })?;
    info!("Web monitor listening on http://{}", addr);
    axum::serve(listener, router(snapshot_tx)).await
}

/// Serves the embedded monitor page.
async fn root_handler() -> impl IntoResponse {
    Html(include_str!("web/monitor.html"))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Sends every snapshot as a JSON text message until the client leaves.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected.");
    let mut snapshot_rx = state.snapshot_tx.subscribe();

    loop {
        tokio::select! {
            received = snapshot_rx.recv() => {
                let snapshot = match received {
                    Ok(snapshot) => snapshot,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!("WebSocket client lagging, skipped {} snapshots.", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match serde_json::to_string(&snapshot) {
                    Ok(json_payload) => {
                        if socket.send(Message::Text(json_payload.into())).await.is_err() {
                            info!("WebSocket client disconnected (send error).");
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize snapshot to JSON: {}", e),
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected.");
                        break;
                    }
                    Some(Err(e)) => {
                        info!("WebSocket client error: {}", e);
                        break;
                    }
                    // Pings are answered by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
