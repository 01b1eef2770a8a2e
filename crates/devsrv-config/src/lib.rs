//! Configuration management for devsrv.
//!
//! Parses `devsrv.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `build.command`, `build.args`, `build.externals`
//! - path fields (`public.dir`, `build.entry_points`, `build.out_dir`,
//!   `watch.source_dir`), which also expand a leading `~`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the directory static files are served from.
    pub public_dir: Option<PathBuf>,
    /// Override watch mode.
    pub watch_enabled: Option<bool>,
    /// Override the debounce interval.
    pub debounce_ms: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "devsrv.toml";

/// Longest accepted debounce interval.
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Longest accepted build timeout.
const MAX_BUILD_TIMEOUT_MS: u64 = 3_600_000;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Static file configuration (paths are relative strings from TOML).
    public: PublicConfigRaw,
    /// Bundler configuration (paths are relative strings from TOML).
    build: BuildConfigRaw,
    /// Watch configuration (paths are relative strings from TOML).
    watch: WatchConfigRaw,

    /// Resolved static file configuration (set after loading).
    #[serde(skip)]
    pub public_resolved: PublicConfig,
    /// Resolved bundler configuration (set after loading).
    #[serde(skip)]
    pub build_resolved: BuildConfig,
    /// Resolved watch configuration (set after loading).
    #[serde(skip)]
    pub watch_resolved: WatchConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Raw `[public]` section as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PublicConfigRaw {
    dir: Option<String>,
    index_file: Option<String>,
}

/// Resolved static file configuration.
#[derive(Debug)]
pub struct PublicConfig {
    /// Directory static files are served from.
    pub dir: PathBuf,
    /// Document served for `/` and for paths ending in `/`.
    pub index_file: String,
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public"),
            index_file: "index.html".to_owned(),
        }
    }
}

/// Raw `[build]` section as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct BuildConfigRaw {
    command: Option<String>,
    args: Option<Vec<String>>,
    entry_points: Option<Vec<String>>,
    out_dir: Option<String>,
    externals: Option<Vec<String>>,
    timeout_ms: Option<u64>,
}

/// Resolved bundler configuration with absolute paths.
#[derive(Debug)]
pub struct BuildConfig {
    /// Bundler executable.
    pub command: String,
    /// Arguments placed before externals, entry points and the output directory.
    pub args: Vec<String>,
    /// Entry points handed to the bundler.
    pub entry_points: Vec<PathBuf>,
    /// Directory the bundler writes artifacts into.
    pub out_dir: PathBuf,
    /// Module specifiers excluded from the bundle.
    pub externals: Vec<String>,
    /// Kill the bundler after this many milliseconds (`None` waits forever).
    pub timeout_ms: Option<u64>,
}

impl BuildConfig {
    fn with_base(base: &Path) -> Self {
        Self {
            command: "deno".to_owned(),
            args: vec!["bundle".to_owned()],
            entry_points: vec![base.join("src/main.ts")],
            out_dir: base.join("public/js"),
            externals: Vec::new(),
            timeout_ms: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::with_base(Path::new("."))
    }
}

/// Filesystem event kinds that may drive a rebuild.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchEvent {
    /// A file appeared.
    Created,
    /// A file's content or metadata changed.
    Modified,
    /// A file disappeared.
    Removed,
}

/// Raw `[watch]` section as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WatchConfigRaw {
    enabled: Option<bool>,
    source_dir: Option<String>,
    patterns: Option<Vec<String>>,
    events: Option<Vec<WatchEvent>>,
    debounce_ms: Option<u64>,
}

/// Resolved watch configuration.
#[derive(Debug)]
pub struct WatchConfig {
    /// Whether source changes trigger rebuilds.
    pub enabled: bool,
    /// Directory watched recursively.
    pub source_dir: PathBuf,
    /// Glob patterns, relative to `source_dir`, a changed path must match.
    pub patterns: Vec<String>,
    /// Event kinds considered relevant.
    pub events: Vec<WatchEvent>,
    /// Quiet period after the last relevant change before rebuilding.
    pub debounce_ms: u64,
}

impl WatchConfig {
    fn with_base(base: &Path) -> Self {
        Self {
            enabled: true,
            source_dir: base.join("src"),
            patterns: vec!["**/*.ts".to_owned()],
            events: vec![WatchEvent::Modified],
            debounce_ms: 100,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::with_base(Path::new("."))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// A `${VAR}` reference without a default could not be expanded.
    #[error("Cannot expand ${{{var}}} in {field}: {source}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Referenced variable name.
        var: String,
        /// Lookup failure.
        source: std::env::VarError,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `devsrv.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(public_dir) = &settings.public_dir {
            self.public_resolved.dir.clone_from(public_dir);
        }
        if let Some(enabled) = settings.watch_enabled {
            self.watch_resolved.enabled = enabled;
        }
        if let Some(debounce_ms) = settings.debounce_ms {
            self.watch_resolved.debounce_ms = debounce_ms;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            public: PublicConfigRaw::default(),
            build: BuildConfigRaw::default(),
            watch: WatchConfigRaw::default(),
            public_resolved: PublicConfig {
                dir: base.join("public"),
                ..PublicConfig::default()
            },
            build_resolved: BuildConfig::with_base(base),
            watch_resolved: WatchConfig::with_base(base),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically at the end of [`Config::load`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_build()?;
        self.validate_watch()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 would bind a random port the browser cannot know about
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        require_non_empty(&self.public_resolved.index_file, "public.index_file")?;
        Ok(())
    }

    fn validate_build(&self) -> Result<(), ConfigError> {
        let build = &self.build_resolved;
        require_non_empty(&build.command, "build.command")?;

        if build.entry_points.is_empty() {
            return Err(ConfigError::Validation(
                "build.entry_points must list at least one entry point".to_owned(),
            ));
        }

        if let Some(timeout_ms) = build.timeout_ms
            && timeout_ms > MAX_BUILD_TIMEOUT_MS
        {
            return Err(ConfigError::Validation(format!(
                "build.timeout_ms cannot exceed {MAX_BUILD_TIMEOUT_MS}"
            )));
        }

        Ok(())
    }

    fn validate_watch(&self) -> Result<(), ConfigError> {
        let watch = &self.watch_resolved;

        for pattern in &watch.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("watch.patterns: invalid glob {pattern:?}: {e}"))
            })?;
        }

        if !watch.enabled {
            return Ok(());
        }

        if watch.events.is_empty() {
            return Err(ConfigError::Validation(
                "watch.events must list at least one event kind".to_owned(),
            ));
        }
        if watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be greater than 0".to_owned(),
            ));
        }
        if watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        Ok(())
    }

    /// Expand `${VAR}` references, and `~` in path fields, before the raw
    /// strings are resolved against the config directory.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::text(&mut self.server.host, "server.host")?;

        expand::optional(self.public.dir.as_mut(), "public.dir", expand::path)?;

        let build = &mut self.build;
        expand::optional(build.command.as_mut(), "build.command", expand::text)?;
        expand::list(build.args.as_mut(), "build.args", expand::text)?;
        expand::list(build.entry_points.as_mut(), "build.entry_points", expand::path)?;
        expand::optional(build.out_dir.as_mut(), "build.out_dir", expand::path)?;
        expand::list(build.externals.as_mut(), "build.externals", expand::text)?;

        expand::optional(self.watch.source_dir.as_mut(), "watch.source_dir", expand::path)?;

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));
        let build_defaults = BuildConfig::with_base(config_dir);
        let watch_defaults = WatchConfig::with_base(config_dir);

        self.public_resolved = PublicConfig {
            dir: resolve(self.public.dir.as_deref(), "public"),
            index_file: self
                .public
                .index_file
                .clone()
                .unwrap_or_else(|| PublicConfig::default().index_file),
        };

        self.build_resolved = BuildConfig {
            command: self.build.command.clone().unwrap_or(build_defaults.command),
            args: self.build.args.clone().unwrap_or(build_defaults.args),
            entry_points: self.build.entry_points.as_ref().map_or(
                build_defaults.entry_points,
                |entries| entries.iter().map(|e| config_dir.join(e)).collect(),
            ),
            out_dir: resolve(self.build.out_dir.as_deref(), "public/js"),
            externals: self.build.externals.clone().unwrap_or_default(),
            // 0 keeps the no-timeout default
            timeout_ms: self.build.timeout_ms.filter(|ms| *ms > 0),
        };

        self.watch_resolved = WatchConfig {
            enabled: self.watch.enabled.unwrap_or(watch_defaults.enabled),
            source_dir: resolve(self.watch.source_dir.as_deref(), "src"),
            patterns: self
                .watch
                .patterns
                .clone()
                .unwrap_or(watch_defaults.patterns),
            events: self.watch.events.clone().unwrap_or(watch_defaults.events),
            debounce_ms: self.watch.debounce_ms.unwrap_or(watch_defaults.debounce_ms),
        };
    }
}
