//! `devsrv serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use devsrv_config::{CliSettings, Config};
use devsrv_server::{DevServer, RELOAD_SOCKET_PATH, ServerError, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover devsrv.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve static files from (overrides config).
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Quiet period in milliseconds before rebuilding (overrides config).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Enable verbose output (build timings and change events).
    #[arg(short, long)]
    pub verbose: bool,

    /// Rebuild on source changes (default: enabled).
    #[arg(long)]
    watch: Option<bool>,

    /// Disable rebuilding on source changes.
    #[arg(long, conflicts_with = "watch")]
    no_watch: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the initial build fails, or
    /// the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let watch_enabled = self.resolve_watch_enabled();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            public_dir: self.public_dir,
            watch_enabled,
            debounce_ms: self.debounce_ms,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.info(&super::config_source(&config));
        output.info(&format!(
            "Public directory: {}",
            config.public_resolved.dir.display()
        ));
        if config.watch_resolved.enabled {
            output.info(&format!(
                "Watching: {} ({})",
                config.watch_resolved.source_dir.display(),
                config.watch_resolved.patterns.join(", ")
            ));
        } else {
            output.info("Watching: disabled");
        }
        output.info(&format!("Building with {}...", config.build_resolved.command));

        let server = match DevServer::start(server_config_from_config(&config)).await {
            Ok(server) => server,
            Err(err) => {
                if let ServerError::InitialBuild { stderr, .. } = &err {
                    output.captured(stderr);
                }
                return Err(err.into());
            }
        };

        let addr = server.local_addr()?;
        output.success(&format!("Server running at http://{addr}"));
        output.highlight(&format!("Live reload: ws://{addr}{RELOAD_SOCKET_PATH}"));

        server.run().await?;
        Ok(())
    }

    /// Resolve `watch_enabled` from --watch/--no-watch flags.
    fn resolve_watch_enabled(&self) -> Option<bool> {
        self.no_watch.then_some(false).or(self.watch)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        TestCli::parse_from(std::iter::once("serve").chain(args.iter().copied())).args
    }

    #[test]
    fn test_watch_defaults_to_config() {
        assert_eq!(parse(&[]).resolve_watch_enabled(), None);
    }

    #[test]
    fn test_no_watch_disables() {
        assert_eq!(parse(&["--no-watch"]).resolve_watch_enabled(), Some(false));
    }

    #[test]
    fn test_explicit_watch_value() {
        assert_eq!(
            parse(&["--watch", "true"]).resolve_watch_enabled(),
            Some(true)
        );
    }

    #[test]
    fn test_watch_flags_conflict() {
        let result = TestCli::try_parse_from(["serve", "--watch", "true", "--no-watch"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_parsed() {
        let args = parse(&["--port", "9000", "--host", "0.0.0.0", "--debounce-ms", "250"]);
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.debounce_ms, Some(250));
    }
}
