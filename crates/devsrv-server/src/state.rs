//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::live_reload::ReloadRegistry;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Connected live reload clients.
    pub(crate) registry: Arc<ReloadRegistry>,
    /// Directory static files are served from.
    pub(crate) public_dir: PathBuf,
    /// File served for `/` and paths ending in `/`.
    pub(crate) index_file: String,
}
