//! WebSocket handler for live reload.
//!
//! Each connection owns one registered reload channel for its lifetime.
//! The server sends the text message `reload` on every broadcast and answers
//! the text message `ping` with `pong`. Anything else from the client is
//! ignored.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::registry::ReloadChannel;
use crate::state::AppState;

pub(crate) const RELOAD_MESSAGE: &str = "reload";
pub(crate) const PING_MESSAGE: &str = "ping";
pub(crate) const PONG_MESSAGE: &str = "pong";

/// Handle WebSocket upgrade for live reload.
///
/// Plain HTTP requests to the endpoint get `501 Not Implemented`.
pub(crate) async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(|socket| handle_socket(socket, state)),
        Err(rejection) => {
            tracing::debug!(%rejection, "Rejected non-WebSocket request to reload endpoint");
            StatusCode::NOT_IMPLEMENTED.into_response()
        }
    }
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (channel, mut signals) = ReloadChannel::open();
    let id = channel.id();
    state.registry.register(channel);
    tracing::info!(channel = %id, clients = state.registry.size(), "Live reload client connected");

    loop {
        tokio::select! {
            // Forward reload signals to the client
            signal = signals.recv() => {
                // `None` means the registry dropped this channel
                if signal.is_none() {
                    break;
                }
                let reload = Message::Text(Utf8Bytes::from_static(RELOAD_MESSAGE));
                if socket.send(reload).await.is_err() {
                    break;
                }
            }
            // Handle client messages (keepalive)
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) if text.as_str() == PING_MESSAGE => {
                        let pong = Message::Text(Utf8Bytes::from_static(PONG_MESSAGE));
                        if socket.send(pong).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(channel = %id, error = %e, "Live reload socket error");
                        break;
                    }
                }
            }
        }
    }

    state.registry.unregister(id);
    tracing::info!(channel = %id, clients = state.registry.size(), "Live reload client disconnected");
}
