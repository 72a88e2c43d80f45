//! Test utilities and fixtures for music-indexer tests.
//!
//! This module provides common test helpers, mock factories, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::test_utils::{temp_db, insert_mock_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let id = insert_mock_track(&pool, "file:///Music/a.mp3").await;
//!     // ... test logic
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::db::tracks::TrackRecord;
use crate::error::{Error, Result};
use crate::metadata::{MetadataSource, TrackMetadata};
use crate::scanner::Candidate;

/// Modification time given to every mock track and candidate.
pub const MOCK_MTIME: i64 = 1_700_000_000;

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = crate::db::db_url(Some(&dir.path().join("test.db")));

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a mock TrackRecord with sensible defaults.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let custom = TrackRecord {
///     name: "Custom".to_string(),
///     ..mock_track_record("file:///a.mp3")
/// };
/// ```
pub fn mock_track_record(uri: &str) -> TrackRecord {
    TrackRecord {
        uri: uri.to_string(),
        name: "Test Track".to_string(),
        artist_name: Some("Test Artist".to_string()),
        album_id: None,
        disc: None,
        track: Some(1),
        duration: 180,
        year: None,
        modification_time: MOCK_MTIME,
    }
}

/// Inserts a mock track into the database and returns its ID.
///
/// Creates the "Test Artist" and "Test Album" records as needed.
pub async fn insert_mock_track(pool: &SqlitePool, uri: &str) -> i64 {
    crate::db::artists::ensure_artist(pool, "Test Artist")
        .await
        .expect("Failed to create artist");
    let album_id = crate::db::albums::get_or_create_album(pool, "Test Album", "Test Artist", None)
        .await
        .expect("Failed to create album");

    let record = TrackRecord {
        album_id: Some(album_id),
        ..mock_track_record(uri)
    };
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    crate::db::tracks::upsert_track(&mut conn, &record)
        .await
        .expect("Failed to insert track")
}

/// A crawl candidate for a path that need not exist.
pub fn mock_candidate(path: &str) -> Candidate {
    let path = PathBuf::from(path);
    Candidate {
        uri: crate::uri::from_path(&path),
        path,
        size: 0,
        modified: MOCK_MTIME,
    }
}

/// Creates an empty file (and its parent directories) under `root`.
pub fn touch(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create directories");
    }
    std::fs::File::create(&path).expect("Failed to create file");
    path
}

/// In-memory [`MetadataSource`] keyed by file path.
///
/// Paths without an entry fail to read, like a file with no tags lofty
/// understands.
#[derive(Debug, Default)]
pub struct FakeSource {
    tracks: Mutex<HashMap<PathBuf, std::result::Result<TrackMetadata, String>>>,
    artwork: Mutex<HashMap<PathBuf, Vec<u8>>>,
    reads: Mutex<usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(
        self,
        path: impl AsRef<Path>,
        title: &str,
        artist: &str,
        album: Option<&str>,
        duration: u64,
    ) -> Self {
        self.set_metadata(
            path,
            TrackMetadata {
                title: Some(title.to_string()),
                artist: Some(artist.to_string()),
                album: album.map(String::from),
                duration,
                ..TrackMetadata::default()
            },
        );
        self
    }

    pub fn with_metadata(self, path: impl AsRef<Path>, meta: TrackMetadata) -> Self {
        self.set_metadata(path, meta);
        self
    }

    pub fn with_failure(self, path: impl AsRef<Path>, message: &str) -> Self {
        self.set_failure(path, message);
        self
    }

    pub fn with_artwork(self, path: impl AsRef<Path>, bytes: Vec<u8>) -> Self {
        self.artwork
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), bytes);
        self
    }

    /// Replace the tags of a file, e.g. to simulate a retag between scans.
    pub fn set_metadata(&self, path: impl AsRef<Path>, meta: TrackMetadata) {
        self.tracks
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), Ok(meta));
    }

    pub fn set_failure(&self, path: impl AsRef<Path>, message: &str) {
        self.tracks
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), Err(message.to_string()));
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

impl MetadataSource for FakeSource {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        *self.reads.lock().unwrap() += 1;
        match self.tracks.lock().unwrap().get(path) {
            Some(Ok(meta)) => Ok(meta.clone()),
            Some(Err(message)) => Err(Error::metadata(path, message.clone())),
            None => Err(Error::metadata(path, "no readable tags")),
        }
    }

    fn artwork(&self, path: &Path) -> Option<Vec<u8>> {
        self.artwork.lock().unwrap().get(path).cloned()
    }
}

/// A small valid PNG, for artwork tests.
pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(4, 4, image::Rgb(color));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let tracks = crate::db::tracks::get_all_tracks(&pool).await.unwrap();
        assert!(tracks.is_empty());
    }

    #[tokio::test]
    async fn test_insert_mock_track() {
        let (pool, _dir) = temp_db().await;

        let id = insert_mock_track(&pool, "file:///test/song.mp3").await;
        assert!(id > 0);

        let tracks = crate::db::tracks::get_all_tracks(&pool).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].uri, "file:///test/song.mp3");
        assert!(tracks[0].album_id.is_some());
    }

    #[test]
    fn test_mock_candidate_uri() {
        let candidate = mock_candidate("/music/song.flac");
        assert_eq!(candidate.uri, "file:///music/song.flac");
        assert_eq!(candidate.modified, MOCK_MTIME);
    }

    #[test]
    fn test_fake_source_reads() {
        let source = FakeSource::new().with_track("/a.mp3", "A", "B", None, 60);
        assert_eq!(
            source.read(Path::new("/a.mp3")).unwrap().title.as_deref(),
            Some("A")
        );
        assert!(source.read(Path::new("/missing.mp3")).is_err());
        assert_eq!(source.reads(), 2);
    }
}
