//! Change event classification.
//!
//! Decides which filesystem changes are relevant enough to trigger a rebuild:
//! the event kind must be in the configured policy and at least one affected
//! path must match a watch pattern relative to the source directory.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind};

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A filesystem change reported by the watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Convert a raw notify event. Access and metadata-less kinds are dropped.
    pub(crate) fn from_notify(event: Event) -> Option<Self> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => return None,
        };
        Some(Self {
            paths: event.paths,
            kind,
        })
    }
}

/// Relevance policy for change events.
#[derive(Clone, Debug)]
pub struct ChangeFilter {
    source_dir: PathBuf,
    patterns: Vec<glob::Pattern>,
    kinds: Vec<ChangeKind>,
}

impl ChangeFilter {
    /// Create a filter for paths under `source_dir`.
    ///
    /// Invalid glob patterns are skipped with a warning. An empty pattern
    /// list matches every path under the source directory.
    #[must_use]
    pub fn new(source_dir: PathBuf, patterns: &[String], kinds: Vec<ChangeKind>) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "Ignoring invalid watch pattern");
                    None
                }
            })
            .collect();
        Self {
            source_dir,
            patterns,
            kinds,
        }
    }

    /// Whether the event should trigger a rebuild.
    #[must_use]
    pub fn is_relevant(&self, event: &ChangeEvent) -> bool {
        self.kinds.contains(&event.kind) && event.paths.iter().any(|p| self.matches(p))
    }

    fn matches(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.source_dir) else {
            return false;
        };
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches_path(relative))
    }
}
