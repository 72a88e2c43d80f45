//! `file://` URI helpers.
//!
//! Every track is identified by `file://` + its absolute path with forward
//! slashes, e.g. `file:///Music/Rock/song1.mp3`. Folder paths drop the
//! `file:///` prefix and always end with `/` (`Music/Rock/`).

use std::path::Path;

/// Scheme prefix of every catalog URI.
pub const FILE_SCHEME: &str = "file://";

/// Prefix stripped from URIs to get folder paths.
const FOLDER_PREFIX: &str = "file:///";

/// Build a catalog URI from an absolute filesystem path.
pub fn from_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("{FILE_SCHEME}{raw}")
    } else {
        // Windows drive paths (`C:/Music`) still get three slashes.
        format!("{FOLDER_PREFIX}{raw}")
    }
}

/// Filesystem path (with forward slashes) behind a catalog URI.
pub fn to_path(uri: &str) -> Option<&str> {
    uri.strip_prefix(FILE_SCHEME)
}

/// Whether a string already uses the catalog URI scheme.
pub fn is_catalog_uri(value: &str) -> bool {
    value.starts_with(FILE_SCHEME)
}

/// Make sure a path string ends with `/`.
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Folder path (without `file:///`, trailing `/`) of the directory that
/// holds the file at `uri`.
///
/// Returns `None` for URIs outside the scheme or for files at the root.
pub fn parent_folder(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix(FOLDER_PREFIX)?;
    let cut = rest.rfind('/')?;
    Some(format!("{}/", &rest[..cut]))
}

/// URI prefix that every file under `folder` starts with.
pub fn folder_prefix(folder: &str) -> String {
    format!("{FOLDER_PREFIX}{}", with_trailing_slash(folder.trim_start_matches('/')))
}

/// Whether `path` equals `prefix` or lies under it, comparing whole path
/// segments (`/music` does not cover `/musical`).
pub fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Collapse `.` and `..` segments and duplicate slashes.
///
/// Leading `..` segments that would climb above the root are dropped.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}
