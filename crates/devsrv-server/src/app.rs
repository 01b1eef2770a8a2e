//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::live_reload;
use crate::state::AppState;
use crate::static_files;

/// WebSocket endpoint for live reload clients.
pub const RELOAD_SOCKET_PATH: &str = "/ws/reload";
/// HTTP endpoint that broadcasts a reload.
pub const RELOAD_API_PATH: &str = "/api/reload";

/// Create the application router.
///
/// Everything outside the two live reload endpoints is served from the
/// public directory; methods other than GET and HEAD get `405`. The reload
/// API answers GET only, since HEAD would otherwise broadcast too.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(RELOAD_SOCKET_PATH, get(live_reload::ws_handler))
        .route(
            RELOAD_API_PATH,
            get(handlers::reload::trigger_reload).head(handlers::reload::reject_head),
        )
        .fallback(get(static_files::serve_static))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
