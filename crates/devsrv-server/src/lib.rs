//! Development server for bundled web applications.
//!
//! This crate provides an axum HTTP server that:
//! - serves static files from a public directory
//! - rebuilds the application bundle when watched sources change
//! - tells connected browsers to reload over a WebSocket once a rebuild succeeds
//!
//! # Quick Start
//!
//! ```ignore
//! use devsrv_server::{DevServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), devsrv_server::ServerError> {
//!     let server = DevServer::start(ServerConfig::default()).await?;
//!     println!("Serving on http://{}", server.local_addr()?);
//!     server.run().await
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (devsrv-server)
//!                        │
//!                        ├─► /ws/reload ──► ReloadRegistry ◄── /api/reload
//!                        │                       ▲
//!                        │                       │ broadcast on success
//!                        │                       │
//!                        │   notify ──► RebuildTrigger ──► BuildRunner (bundler process)
//!                        │
//!                        └─► static files (public directory)
//! ```

mod app;
mod bundler;
mod error;
mod handlers;
pub mod live_reload;
mod paths;
mod state;
mod static_files;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use app::{RELOAD_API_PATH, RELOAD_SOCKET_PATH};
pub use bundler::{BuildOutcome, BuildRunner, Bundler};
pub use error::ServerError;
pub use handlers::reload::ReloadResponse;
use live_reload::{ChangeFilter, ChangeKind, RebuildTrigger, ReloadRegistry, SourceWatcher};
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// Directory static files are served from.
    pub public_dir: PathBuf,
    /// File served for `/` and directory paths.
    pub index_file: String,
    /// Bundler executable.
    pub bundler_command: String,
    /// Leading bundler arguments.
    pub bundler_args: Vec<String>,
    /// Application entry points.
    pub entry_points: Vec<PathBuf>,
    /// Bundle output directory.
    pub out_dir: PathBuf,
    /// Module specifiers excluded from the bundle.
    pub externals: Vec<String>,
    /// Kill the bundler after this long (`None` waits forever).
    pub build_timeout: Option<Duration>,
    /// Rebuild on source changes.
    pub watch_enabled: bool,
    /// Directory watched for changes.
    pub source_dir: PathBuf,
    /// Glob patterns a changed path must match.
    pub watch_patterns: Vec<String>,
    /// Change kinds that trigger a rebuild.
    pub watch_events: Vec<ChangeKind>,
    /// Quiet period before rebuilding.
    pub debounce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            public_dir: PathBuf::from("public"),
            index_file: "index.html".to_owned(),
            bundler_command: "deno".to_owned(),
            bundler_args: vec!["bundle".to_owned()],
            entry_points: vec![PathBuf::from("src/main.ts")],
            out_dir: PathBuf::from("public/js"),
            externals: Vec::new(),
            build_timeout: None,
            watch_enabled: true,
            source_dir: PathBuf::from("src"),
            watch_patterns: vec!["**/*.ts".to_owned()],
            watch_events: vec![ChangeKind::Modified],
            debounce: Duration::from_millis(100),
        }
    }
}

impl ServerConfig {
    /// Bundler invocation described by this configuration.
    #[must_use]
    pub fn build_runner(&self) -> BuildRunner {
        BuildRunner::new(
            self.bundler_command.clone(),
            self.entry_points.clone(),
            self.out_dir.clone(),
        )
        .with_args(self.bundler_args.clone())
        .with_externals(self.externals.clone())
        .with_timeout(self.build_timeout)
    }
}

/// Create server configuration from devsrv config.
#[must_use]
pub fn server_config_from_config(config: &devsrv_config::Config) -> ServerConfig {
    let build = &config.build_resolved;
    let watch = &config.watch_resolved;

    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        public_dir: config.public_resolved.dir.clone(),
        index_file: config.public_resolved.index_file.clone(),
        bundler_command: build.command.clone(),
        bundler_args: build.args.clone(),
        entry_points: build.entry_points.clone(),
        out_dir: build.out_dir.clone(),
        externals: build.externals.clone(),
        build_timeout: build.timeout_ms.map(Duration::from_millis),
        watch_enabled: watch.enabled,
        source_dir: watch.source_dir.clone(),
        watch_patterns: watch.patterns.clone(),
        watch_events: watch.events.iter().copied().map(change_kind).collect(),
        debounce: Duration::from_millis(watch.debounce_ms),
    }
}

fn change_kind(event: devsrv_config::WatchEvent) -> ChangeKind {
    match event {
        devsrv_config::WatchEvent::Created => ChangeKind::Created,
        devsrv_config::WatchEvent::Modified => ChangeKind::Modified,
        devsrv_config::WatchEvent::Removed => ChangeKind::Removed,
    }
}

/// Watcher plus the task consuming its events.
struct WatchTask {
    _watcher: SourceWatcher,
    trigger: JoinHandle<()>,
}

impl WatchTask {
    /// Stop the rebuild trigger and wait until it has been dropped, which
    /// aborts any build it still had running.
    async fn stop(self) {
        self.trigger.abort();
        if let Err(e) = self.trigger.await
            && !e.is_cancelled()
        {
            tracing::error!(error = %e, "Rebuild trigger failed");
        }
        tracing::debug!("File watching stopped");
    }
}

/// A started development server.
///
/// [`DevServer::start`] performs the initial build and binds the listener;
/// no request is served until [`DevServer::run`] or [`DevServer::run_until`].
pub struct DevServer {
    listener: TcpListener,
    state: Arc<AppState>,
    watch: Option<WatchTask>,
}

impl DevServer {
    /// Build the application once, start watching, and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InitialBuild`] if the first build fails, in
    /// which case nothing is bound. Also fails if the source directory cannot
    /// be watched or the address cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let runner = Arc::new(config.build_runner());

        tracing::info!(command = %config.bundler_command, "Running initial build");
        let outcome = runner.build().await;
        if !outcome.success {
            tracing::error!(
                status = ?outcome.status,
                stderr = %outcome.stderr.trim_end(),
                "Initial build failed"
            );
            return Err(ServerError::InitialBuild {
                status: outcome.status,
                stderr: outcome.stderr,
            });
        }
        tracing::info!(elapsed_ms = outcome.elapsed_ms(), "Initial build complete");

        let registry = Arc::new(ReloadRegistry::new());

        let watch = if config.watch_enabled {
            Some(start_watch(&config, runner, Arc::clone(&registry))?)
        } else {
            None
        };

        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening");

        let state = Arc::new(AppState {
            registry,
            public_dir: config.public_dir,
            index_file: config.index_file,
        });

        Ok(Self {
            listener,
            state,
            watch,
        })
    }

    /// Address the server is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Registry of connected live reload clients.
    #[must_use]
    pub fn registry(&self) -> Arc<ReloadRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then stop watching.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = app::create_router(self.state);
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(watch) = self.watch {
            watch.stop().await;
        }
        result?;
        Ok(())
    }
}

fn start_watch(
    config: &ServerConfig,
    runner: Arc<BuildRunner>,
    registry: Arc<ReloadRegistry>,
) -> Result<WatchTask, ServerError> {
    // notify reports canonical paths, so match against the canonical root
    let source_dir =
        std::fs::canonicalize(&config.source_dir).map_err(|source| ServerError::SourceDir {
            path: config.source_dir.clone(),
            source,
        })?;

    let (watcher, events) = SourceWatcher::start(&source_dir)?;
    let filter = ChangeFilter::new(
        source_dir,
        &config.watch_patterns,
        config.watch_events.clone(),
    );
    let trigger = RebuildTrigger::new(runner, registry, filter, config.debounce);

    Ok(WatchTask {
        _watcher: watcher,
        trigger: tokio::spawn(trigger.run(events)),
    })
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_matches_conventional_layout() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.public_dir, PathBuf::from("public"));
        assert_eq!(config.out_dir, PathBuf::from("public/js"));
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.watch_events, vec![ChangeKind::Modified]);
    }

    #[test]
    fn test_server_config_from_config() {
        let mut config = devsrv_config::Config::default();
        config.build_resolved.externals = vec!["https://esm.sh/phaser@4.0.0-rc.4".to_owned()];
        config.build_resolved.timeout_ms = Some(30_000);
        config.watch_resolved.events =
            vec![devsrv_config::WatchEvent::Created, devsrv_config::WatchEvent::Modified];

        let server = server_config_from_config(&config);

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 8000);
        assert_eq!(server.public_dir, Path::new(".").join("public"));
        assert_eq!(server.entry_points, vec![Path::new(".").join("src/main.ts")]);
        assert_eq!(server.source_dir, Path::new(".").join("src"));
        assert_eq!(server.externals, vec!["https://esm.sh/phaser@4.0.0-rc.4"]);
        assert_eq!(server.build_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            server.watch_events,
            vec![ChangeKind::Created, ChangeKind::Modified]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_initial_build_failure_prevents_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            port: 0,
            public_dir: dir.path().to_path_buf(),
            bundler_command: "sh".to_owned(),
            bundler_args: vec!["-c".to_owned(), "echo 'syntax error' >&2; exit 1".to_owned()],
            watch_enabled: false,
            ..ServerConfig::default()
        };

        let Err(err) = DevServer::start(config).await else {
            panic!("server should not start after a failed build");
        };

        match err {
            ServerError::InitialBuild { status, stderr } => {
                assert_eq!(status, Some(1));
                assert_eq!(stderr.trim(), "syntax error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_source_dir_prevents_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            port: 0,
            public_dir: dir.path().to_path_buf(),
            bundler_command: "sh".to_owned(),
            bundler_args: vec!["-c".to_owned(), "true".to_owned()],
            source_dir: dir.path().join("missing"),
            ..ServerConfig::default()
        };

        let result = DevServer::start(config).await;

        assert!(matches!(result, Err(ServerError::SourceDir { .. })));
    }
}
