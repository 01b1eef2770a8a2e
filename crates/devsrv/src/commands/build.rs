//! `devsrv build` command implementation.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use devsrv_config::Config;
use devsrv_server::{Bundler, RELOAD_API_PATH, ReloadResponse, server_config_from_config};
use ureq::Agent;

use crate::error::CliError;
use crate::output::Output;

/// How long to wait for a running server to answer the reload request.
const RELOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover devsrv.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ask a running server to reload its clients after a successful build.
    #[arg(long)]
    reload: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the bundler fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), None)?;
        let server_config = server_config_from_config(&config);

        output.info(&super::config_source(&config));
        output.info(&format!("Building with {}...", server_config.bundler_command));
        let outcome = server_config.build_runner().build().await;

        if !outcome.stdout.trim().is_empty() {
            output.captured(&outcome.stdout);
        }
        if !outcome.success {
            output.captured(&outcome.stderr);
            let message = match outcome.status {
                Some(code) => format!("Build failed with exit code {code}"),
                None => "Build failed".to_owned(),
            };
            return Err(CliError::Build(message));
        }
        output.success(&format!("Build complete in {:.0}ms", outcome.elapsed_ms()));

        if self.reload {
            let url = reload_url(&config.server.host, config.server.port);
            match tokio::task::spawn_blocking(move || request_reload(&url)).await {
                Ok(Ok(response)) => output.info(&format!(
                    "Reload sent to {} client(s)",
                    response.clients
                )),
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Reload request failed");
                    output.info("Could not trigger reload (server not ready)");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Reload request task failed");
                    output.info("Could not trigger reload (server not ready)");
                }
            }
        }

        Ok(())
    }
}

/// URL of the reload endpoint of a server bound to `host:port`.
///
/// Wildcard bind addresses are contacted through loopback.
fn reload_url(host: &str, port: u16) -> String {
    let host = match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) if ip.is_unspecified() => Ipv4Addr::LOCALHOST.to_string(),
        Ok(IpAddr::V6(ip)) if ip.is_unspecified() => format!("[{}]", Ipv6Addr::LOCALHOST),
        Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
        _ => host.to_owned(),
    };
    format!("http://{host}:{port}{RELOAD_API_PATH}")
}

fn request_reload(url: &str) -> Result<ReloadResponse, ureq::Error> {
    let agent: Agent = Agent::config_builder()
        .timeout_global(Some(RELOAD_TIMEOUT))
        .build()
        .into();

    let mut body = agent.get(url).call()?.into_body();
    body.read_json()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_reload_url() {
        assert_eq!(
            reload_url("127.0.0.1", 8000),
            "http://127.0.0.1:8000/api/reload"
        );
        assert_eq!(
            reload_url("localhost", 3000),
            "http://localhost:3000/api/reload"
        );
    }

    #[test]
    fn test_reload_url_wildcard_uses_loopback() {
        assert_eq!(reload_url("0.0.0.0", 8000), "http://127.0.0.1:8000/api/reload");
        assert_eq!(reload_url("::", 8000), "http://[::1]:8000/api/reload");
    }

    #[test]
    fn test_reload_url_ipv6() {
        assert_eq!(reload_url("::1", 8000), "http://[::1]:8000/api/reload");
    }
}
