//! M3U playlist import.
//!
//! Entries in a playlist file come in three shapes, and one file never mixes
//! them, so the first entry decides how all of them are read:
//!
//! - `file:///Music/a.mp3` - already a catalog URI ([`PathStrategy::Unmodified`])
//! - `/Music/a.mp3`, `C:\Music\a.mp3` - absolute paths ([`PathStrategy::Absolute`])
//! - `../Music/a.mp3` - relative to the playlist file ([`PathStrategy::Relative`])
//!
//! A bare `a.mp3` is ambiguous: it is treated as relative only if the
//! catalog actually holds a track at that resolved location.
//!
//! Entries are matched against the catalog (hidden tracks included) and
//! returned in playlist order; entries with no match are dropped.

use std::path::Path;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::db::tracks;
use crate::error::Result;
use crate::model::Track;
use crate::uri;

/// Playlist import failures shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("playlist has no entries")]
    EmptyPlaylist,

    #[error("none of the {entries} playlist entries match a track in the library")]
    NoMatches { entries: usize },

    #[error("could not read playlist {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// How playlist entries map to catalog URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathStrategy {
    Unmodified,
    Absolute,
    Relative,
}

/// A resolved playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportedPlaylist {
    pub name: String,
    pub strategy: PathStrategy,
    pub tracks: Vec<Track>,
}

/// Entries of an M3U file.
///
/// Comment/directive lines (`#`) and blank lines are skipped, entries are
/// trimmed and backslashes become forward slashes.
pub fn parse_m3u(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.replace('\\', "/"))
        .collect()
}

fn is_absolute(entry: &str) -> bool {
    let bytes = entry.as_bytes();
    entry.starts_with('/') || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Catalog URI for `entry` under `strategy`.
///
/// `dir` is the playlist file's directory, with forward slashes.
pub fn resolve_entry(entry: &str, strategy: PathStrategy, dir: &str) -> String {
    match strategy {
        PathStrategy::Unmodified => urlencoding::decode(entry)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| entry.to_string()),
        PathStrategy::Absolute => uri::from_path(Path::new(entry)),
        PathStrategy::Relative => {
            let joined = uri::normalize(&format!("{}/{entry}", dir.trim_end_matches('/')));
            uri::from_path(Path::new(&joined))
        }
    }
}

/// Pick the strategy from the first entry.
pub async fn detect_strategy(pool: &SqlitePool, first: &str, dir: &str) -> Result<PathStrategy> {
    if uri::is_catalog_uri(first) {
        return Ok(PathStrategy::Unmodified);
    }
    if is_absolute(first) {
        return Ok(PathStrategy::Absolute);
    }
    let probe = resolve_entry(first, PathStrategy::Relative, dir);
    if tracks::track_exists(pool, &probe).await? {
        Ok(PathStrategy::Relative)
    } else {
        Ok(PathStrategy::Absolute)
    }
}

/// Match playlist entries to catalog tracks, keeping playlist order.
pub async fn resolve_playlist(
    pool: &SqlitePool,
    entries: &[String],
    dir: &str,
) -> Result<(PathStrategy, Vec<Track>)> {
    let Some(first) = entries.first() else {
        return Err(ImportError::EmptyPlaylist.into());
    };
    let strategy = detect_strategy(pool, first, dir).await?;

    let uris: Vec<String> = entries
        .iter()
        .map(|entry| resolve_entry(entry, strategy, dir))
        .collect();
    let found = tracks::get_tracks_by_uris(pool, &uris).await?;

    let resolved: Vec<Track> = uris.iter().filter_map(|uri| found.get(uri).cloned()).collect();
    tracing::debug!(
        target: "playlist",
        ?strategy,
        entries = entries.len(),
        matched = resolved.len(),
        "Resolved playlist entries"
    );

    if resolved.is_empty() {
        return Err(ImportError::NoMatches {
            entries: entries.len(),
        }
        .into());
    }
    Ok((strategy, resolved))
}

/// Read an M3U file (given as a `file://` URI or a plain path) and resolve
/// it against the catalog. The playlist is named after the file stem.
pub async fn import_m3u(pool: &SqlitePool, file: &str) -> Result<ImportedPlaylist> {
    let path = match uri::to_path(file) {
        Some(stripped) => urlencoding::decode(stripped)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| stripped.to_string()),
        None => file.to_string(),
    };
    let path = Path::new(&path);

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Playlist".to_string());
    let dir = playlist_dir(path);

    let entries = parse_m3u(&contents);
    let (strategy, tracks) = resolve_playlist(pool, &entries, &dir).await?;

    tracing::info!(target: "playlist", %name, tracks = tracks.len(), "Imported playlist");
    Ok(ImportedPlaylist {
        name,
        strategy,
        tracks,
    })
}

/// Directory that relative entries resolve against, with forward slashes.
///
/// A playlist given by a relative path resolves against the working
/// directory, never the filesystem root.
fn playlist_dir(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}
