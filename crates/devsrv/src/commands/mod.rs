//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod serve;

pub(crate) use build::BuildArgs;
pub(crate) use serve::ServeArgs;

use devsrv_config::Config;

/// Banner line naming where the configuration came from.
fn config_source(config: &Config) -> String {
    match &config.config_path {
        Some(path) => format!("Config: {}", path.display()),
        None => "Config: defaults (no devsrv.toml found)".to_owned(),
    }
}
