//! Filesystem watcher.
//!
//! Adapts notify's callback interface to an async channel of
//! [`ChangeEvent`]s. Watching stops when the [`SourceWatcher`] is dropped.

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::filter::ChangeEvent;
use crate::error::ServerError;

/// Buffered events between the notify thread and the rebuild trigger.
const EVENT_BUFFER: usize = 100;

/// Recursive watcher over the source directory.
pub(crate) struct SourceWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl SourceWatcher {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Watch`] if the watcher cannot be created or the
    /// directory cannot be watched.
    pub(crate) fn start(root: &Path) -> Result<(Self, mpsc::Receiver<ChangeEvent>), ServerError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if let Some(change) = ChangeEvent::from_notify(event) {
                        // Receiver is gone only during shutdown
                        let _ = tx.blocking_send(change);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Filesystem watcher error"),
            }
        })
        .map_err(|source| ServerError::Watch {
            path: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| ServerError::Watch {
                path: root.to_path_buf(),
                source,
            })?;

        tracing::info!(path = %root.display(), "Watching for changes");

        Ok((
            Self {
                _watcher: watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        tracing::debug!(path = %self.root.display(), "Stopped watching");
    }
}
