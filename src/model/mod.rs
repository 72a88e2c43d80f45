//! Core data models for the catalog.
//!
//! Defines the persisted entities: [`Track`], [`Album`], [`Artist`],
//! [`FileNode`], [`InvalidTrack`] and [`Playlist`]. These are derived from
//! SQLx for database mapping and `serde` for CLI output.
//!
//! # Database Schema
//!
//! - `artists` - Artists keyed by name
//! - `albums` - Albums unique per (name, artist name)
//! - `tracks` - Audio files keyed by their `file://` URI
//! - `invalid_tracks` - Files that failed extraction or insertion
//! - `file_nodes` - Directory records for folder browsing
//! - `playlists` / `tracks_to_playlists` - Saved playlists

use serde::Serialize;
use sqlx::FromRow;

/// Release year stored for albums and tracks whose year is unknown.
///
/// Never store NULL: `NULL = NULL` is false in SQL, which splits one album
/// into several rows during lookups and unique checks.
pub const UNKNOWN_YEAR: i64 = -1;

/// Artist name used when a file carries no artist tag.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// An artist, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Artist {
    pub name: String,
    /// Artwork file path
    pub artwork: Option<String>,
}

/// An album in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Album {
    /// Database ID (auto-generated)
    pub id: i64,
    pub name: String,
    /// Album artist
    pub artist_name: String,
    /// Release year, [`UNKNOWN_YEAR`] if absent
    pub release_year: i64,
    /// Artwork saved from an embedded or sidecar image
    pub artwork: Option<String>,
    /// User-chosen artwork
    pub alt_artwork: Option<String>,
}

/// A track (audio file) in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Track {
    /// Database ID (auto-generated, stable across rescans)
    pub id: i64,
    /// `file://` URI (unique identifier)
    pub uri: String,
    pub name: String,
    pub artist_name: Option<String>,
    pub album_id: Option<i64>,
    pub disc: Option<i64>,
    pub track: Option<i64>,
    /// Duration in seconds
    pub duration: i64,
    pub year: Option<i64>,
    pub embedded_artwork: Option<String>,
    pub alt_artwork: Option<String>,
    pub is_favorite: bool,
    pub play_count: i64,
    /// Unix milliseconds
    pub last_played_at: Option<i64>,
    pub hidden: bool,
    /// Unix milliseconds
    pub hidden_at: Option<i64>,
    /// File modification time (unix seconds) when last extracted
    pub modification_time: i64,
    /// Whether the artwork pass already looked at this file
    pub fetched_art: bool,
}

/// A directory that contains at least one track, directly or transitively.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FileNode {
    /// Path without the `file:///` prefix, ending with `/`
    pub path: String,
    /// `None` for a root node
    pub parent_path: Option<String>,
    /// Final path segment
    pub name: String,
}

/// A file that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct InvalidTrack {
    pub uri: String,
    pub error_name: Option<String>,
    pub error_message: String,
    pub modification_time: i64,
    /// Unix milliseconds
    pub discovered_at: i64,
}

/// A user playlist.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Playlist {
    pub name: String,
    pub artwork: Option<String>,
    pub is_favorite: bool,
}
