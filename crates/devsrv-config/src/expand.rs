//! Expansion of `${VAR}` references and `~` in raw configuration values.
//!
//! Only the braced form is recognised. A bare `$VAR` is kept verbatim because
//! bundler arguments often carry shell snippets evaluated later by `sh -c`.

use std::borrow::Cow;
use std::env::VarError;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` in a value, in place.
pub(crate) fn text(value: &mut String, field: &str) -> Result<(), ConfigError> {
    if value.contains("${") {
        let expanded = shellexpand::env_with_context(value.as_str(), lookup)
            .map(Cow::into_owned)
            .map_err(|e| ConfigError::EnvVar {
                field: field.to_owned(),
                var: e.var_name,
                source: e.cause,
            })?;
        *value = expanded;
    }
    Ok(())
}

/// Like [`text`], then expand a leading `~` to the home directory.
pub(crate) fn path(value: &mut String, field: &str) -> Result<(), ConfigError> {
    text(value, field)?;
    if value.starts_with('~') {
        let expanded = shellexpand::tilde(value.as_str()).into_owned();
        *value = expanded;
    }
    Ok(())
}

/// Apply `expand` to an optional field.
pub(crate) fn optional(
    value: Option<&mut String>,
    field: &str,
    expand: fn(&mut String, &str) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    value.map_or(Ok(()), |value| expand(value, field))
}

/// Apply `expand` to every element of an optional list field.
pub(crate) fn list(
    values: Option<&mut Vec<String>>,
    field: &str,
    expand: fn(&mut String, &str) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    values
        .into_iter()
        .flatten()
        .try_for_each(|value| expand(value, field))
}

fn lookup(name: &str) -> Result<Option<String>, VarError> {
    std::env::var(name).map(Some)
}
