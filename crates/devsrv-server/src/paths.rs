//! Request path resolution.
//!
//! Turns the path component of a request URL into a path relative to the
//! public directory, rejecting anything that could escape it.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Why a request path was refused.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum PathError {
    #[error("path is not valid UTF-8 after decoding")]
    Encoding,
    #[error("path contains a parent directory segment")]
    Traversal,
    #[error("path is absolute")]
    Absolute,
}

/// Resolve a URL path to a path relative to the public directory.
///
/// The leading `/` is stripped and percent-escapes are decoded. An empty
/// path or one ending in `/` gets `index_file` appended. The result is then
/// refused if any segment is `..` or if it is rooted.
pub(crate) fn resolve_request_path(url_path: &str, index_file: &str) -> Result<PathBuf, PathError> {
    let trimmed = url_path.strip_prefix('/').unwrap_or(url_path);
    let decoded = percent_decode_str(trimmed)
        .decode_utf8()
        .map_err(|_| PathError::Encoding)?;

    let mut relative = decoded.into_owned();
    if relative.contains('\0') {
        return Err(PathError::Encoding);
    }
    if relative.is_empty() || relative.ends_with('/') {
        relative.push_str(index_file);
    }

    // Backslash counts as a separator regardless of platform
    if relative.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathError::Traversal);
    }
    if relative.starts_with(['/', '\\']) {
        return Err(PathError::Absolute);
    }

    let path = PathBuf::from(relative);
    if path
        .components()
        .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(PathError::Absolute);
    }
    Ok(path)
}

/// MIME type for a file, by extension. Unknown types are `application/octet-stream`.
pub(crate) fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}
