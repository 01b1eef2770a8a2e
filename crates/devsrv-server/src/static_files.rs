//! Static file serving.
//!
//! Serves files from the public directory for every request not claimed by
//! another route. Bodies are streamed from disk and marked `no-cache` so a
//! reload always picks up the latest build output.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::StaticError;
use crate::paths;
use crate::state::AppState;

/// Serve the file addressed by the request path.
pub(crate) async fn serve_static(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let relative = match paths::resolve_request_path(uri.path(), &state.index_file) {
        Ok(relative) => relative,
        Err(e) => {
            tracing::warn!(path = %uri.path(), reason = %e, "Refused request path");
            return StaticError::from(e).into_response();
        }
    };

    match open_file(&state.public_dir.join(&relative)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(path = %relative.display(), error = %e, "Static file not served");
            e.into_response()
        }
    }
}

async fn open_file(path: &Path) -> Result<Response, StaticError> {
    let file = File::open(path).await?;
    let metadata = file.metadata().await?;
    if metadata.is_dir() {
        return Err(StaticError::NotFound);
    }

    let headers = [
        (header::CONTENT_TYPE, paths::content_type(path)),
        (header::CONTENT_LENGTH, metadata.len().to_string()),
        (header::CACHE_CONTROL, "no-cache".to_owned()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}
