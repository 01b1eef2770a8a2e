//! Bundler invocation.
//!
//! Runs the external bundler as a child process and captures its outcome.
//! Failures, including a bundler that cannot be spawned at all, are reported
//! as a [`BuildOutcome`] value rather than an error so that callers decide
//! whether a failure is fatal (initial build) or recoverable (watch rebuild).

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

/// Result of one bundler invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOutcome {
    /// True when the bundler exited with status 0.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error, or a diagnostic when the bundler never ran.
    pub stderr: String,
    /// Exit code (`None` if the process could not be spawned, timed out,
    /// or was terminated by a signal).
    pub status: Option<i32>,
    /// Wall-clock time spent on the invocation.
    pub duration: Duration,
}

impl BuildOutcome {
    /// Outcome for an invocation that produced no exit status.
    fn aborted(diagnostic: String, duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: diagnostic,
            status: None,
            duration,
        }
    }

    /// Duration in fractional milliseconds, for log fields.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Something that can produce the bundled application artifact.
///
/// Implemented by [`BuildRunner`]; tests substitute their own bundlers.
pub trait Bundler: Send + Sync + 'static {
    /// Run one build to completion.
    fn build(&self) -> impl Future<Output = BuildOutcome> + Send;
}

/// Runs the configured bundler command.
///
/// The child is invoked as
/// `<command> <args...> [--external <module>]... <entry_points...> --outdir <out_dir>`.
#[derive(Clone, Debug)]
pub struct BuildRunner {
    command: String,
    args: Vec<String>,
    externals: Vec<String>,
    entry_points: Vec<PathBuf>,
    out_dir: PathBuf,
    timeout: Option<Duration>,
}

impl BuildRunner {
    /// Create a runner for `command` building `entry_points` into `out_dir`.
    #[must_use]
    pub fn new(command: impl Into<String>, entry_points: Vec<PathBuf>, out_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            externals: Vec::new(),
            entry_points,
            out_dir,
            timeout: None,
        }
    }

    /// Set the leading arguments (e.g. `["bundle"]`).
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set module specifiers to exclude from the bundle.
    #[must_use]
    pub fn with_externals(mut self, externals: Vec<String>) -> Self {
        self.externals = externals;
        self
    }

    /// Kill the bundler if it runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument list passed to the bundler.
    fn command_args(&self, entry_points: &[PathBuf], out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        for external in &self.externals {
            args.push("--external".into());
            args.push(external.into());
        }
        args.extend(entry_points.iter().map(|p| p.as_os_str().to_owned()));
        args.push("--outdir".into());
        args.push(out_dir.as_os_str().to_owned());
        args
    }

    /// Build `entry_points` into `out_dir`, waiting for the bundler to exit.
    pub async fn run_build(&self, entry_points: &[PathBuf], out_dir: &Path) -> BuildOutcome {
        let start = Instant::now();

        let mut command = Command::new(&self.command);
        command
            .args(self.command_args(entry_points, out_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %self.command, out_dir = %out_dir.display(), "Spawning bundler");

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return BuildOutcome::aborted(
                        format!(
                            "{} did not finish within {}ms and was killed",
                            self.command,
                            limit.as_millis()
                        ),
                        start.elapsed(),
                    );
                }
            },
            None => command.output().await,
        };

        match output {
            Ok(output) => BuildOutcome {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                status: output.status.code(),
                duration: start.elapsed(),
            },
            Err(e) => BuildOutcome::aborted(
                format!("Failed to run {}: {e}", self.command),
                start.elapsed(),
            ),
        }
    }
}

impl Bundler for BuildRunner {
    fn build(&self) -> impl Future<Output = BuildOutcome> + Send {
        self.run_build(&self.entry_points, &self.out_dir)
    }
}
