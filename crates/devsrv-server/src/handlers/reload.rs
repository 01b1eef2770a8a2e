//! Reload API handler.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Response body of `GET /api/reload`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub success: bool,
    /// Number of clients the reload was sent to.
    pub clients: usize,
}

/// Handle GET /api/reload.
///
/// Broadcasts a reload to every connected client.
pub(crate) async fn trigger_reload(State(state): State<Arc<AppState>>) -> Json<ReloadResponse> {
    let clients = state.registry.broadcast_reload();
    tracing::info!(clients, "Reload requested over HTTP");
    Json(ReloadResponse {
        success: true,
        clients,
    })
}

/// Handle HEAD /api/reload.
///
/// A HEAD request must not broadcast, so it is refused instead of falling
/// through to the GET handler.
pub(crate) async fn reject_head() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_value(ReloadResponse {
            success: true,
            clients: 2,
        })
        .unwrap();

        assert_eq!(json, serde_json::json!({"success": true, "clients": 2}));
    }
}
