//! Rebuild trigger.
//!
//! Single task that owns the debouncer, consumes change events, runs the
//! bundler when the quiet period elapses, and broadcasts a reload after each
//! successful build. Builds are never run concurrently: a new build can only
//! start from `PendingRebuild`, which is unreachable while one is in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;

use super::debouncer::RebuildDebouncer;
use super::filter::{ChangeEvent, ChangeFilter};
use super::registry::ReloadRegistry;
use crate::bundler::{BuildOutcome, Bundler};

/// Couples change events to rebuilds and reload broadcasts.
pub struct RebuildTrigger<B> {
    bundler: Arc<B>,
    registry: Arc<ReloadRegistry>,
    filter: ChangeFilter,
    debounce: Duration,
}

impl<B: Bundler> RebuildTrigger<B> {
    #[must_use]
    pub fn new(
        bundler: Arc<B>,
        registry: Arc<ReloadRegistry>,
        filter: ChangeFilter,
        debounce: Duration,
    ) -> Self {
        Self {
            bundler,
            registry,
            filter,
            debounce,
        }
    }

    /// Process events until the event channel closes.
    ///
    /// A build still running when the loop exits, or when this future is
    /// dropped, is aborted and its bundler process killed.
    pub async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) {
        let mut debouncer = RebuildDebouncer::new(self.debounce);
        let mut in_flight: Option<AbortOnDropHandle<BuildOutcome>> = None;

        loop {
            let deadline = debouncer.next_deadline();

            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if self.filter.is_relevant(&event) {
                        tracing::info!(paths = ?event.paths, kind = ?event.kind, "File changed");
                        debouncer.record(Instant::now());
                    } else {
                        tracing::trace!(paths = ?event.paths, kind = ?event.kind, "Ignoring change");
                    }
                }
                () = wait_until(deadline) => {
                    if debouncer.take_due(Instant::now()) {
                        tracing::info!("Rebuilding");
                        let bundler = Arc::clone(&self.bundler);
                        in_flight = Some(AbortOnDropHandle::new(tokio::spawn(async move {
                            bundler.build().await
                        })));
                    }
                }
                result = join_build(&mut in_flight) => {
                    in_flight = None;
                    self.on_build_finished(result);
                    debouncer.finish_build(Instant::now());
                }
            }
        }

        if let Some(build) = in_flight.take() {
            tracing::debug!("Aborting in-flight build");
            drop(build);
        }
        tracing::debug!("Rebuild trigger stopped");
    }

    fn on_build_finished(&self, result: Result<BuildOutcome, JoinError>) {
        match result {
            Ok(outcome) if outcome.success => {
                let clients = self.registry.broadcast_reload();
                tracing::info!(
                    elapsed_ms = outcome.elapsed_ms(),
                    clients,
                    "Rebuild complete, reload sent"
                );
            }
            Ok(outcome) => {
                tracing::error!(
                    status = ?outcome.status,
                    elapsed_ms = outcome.elapsed_ms(),
                    stderr = %outcome.stderr.trim_end(),
                    "Rebuild failed, clients keep the previous build"
                );
            }
            Err(e) => tracing::error!(error = %e, "Build task failed"),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_build(
    handle: &mut Option<AbortOnDropHandle<BuildOutcome>>,
) -> Result<BuildOutcome, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
