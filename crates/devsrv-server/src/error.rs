//! Server error types.

use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::paths::PathError;

/// Errors that stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The bundler failed before the server started listening.
    #[error("Initial build failed ({})", exit_description(*.status))]
    InitialBuild {
        status: Option<i32>,
        stderr: String,
    },

    /// The source directory to watch could not be resolved.
    #[error("Cannot access source directory {}: {source}", path.display())]
    SourceDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The filesystem watcher could not be started.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn exit_description(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "bundler did not exit normally".to_owned(),
    }
}

/// Static file request failures, mapped to plain-text responses.
#[derive(Debug, thiserror::Error)]
pub(crate) enum StaticError {
    #[error("Forbidden: {0}")]
    Forbidden(#[from] PathError),
    #[error("File not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for StaticError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound,
            _ => Self::Io(e),
        }
    }
}

impl IntoResponse for StaticError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            Self::NotFound => (StatusCode::NOT_FOUND, "File not found"),
            Self::Io(e) => {
                tracing::error!(error = %e, "Failed to serve static file");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, body).into_response()
    }
}
