//! Catalog Store: persistence for tracks, albums, artists, folders,
//! playlists and failure records.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. Every other
//! component reads and writes the catalog through the repository functions
//! in the submodules, one per entity:
//!
//! - [`tracks`] - Track upserts, lookups by URI, folder listings
//! - [`albums`] - Album identity resolution and cleanup
//! - [`artists`] - Artist rows keyed by name
//! - [`invalid_tracks`] - Diagnostic failure records
//! - [`file_nodes`] - Materialized folder tree
//! - [`playlists`] - Saved playlists and their junction rows
//! - [`artwork`] - Live artwork references across all tables
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::db::{init_db, tracks};
//!
//! let pool = init_db("sqlite:library.db").await?;
//! let all = tracks::get_all_tracks(&pool).await?;
//! ```

pub mod albums;
pub mod artists;
pub mod artwork;
pub mod file_nodes;
pub mod invalid_tracks;
pub mod playlists;
pub mod tracks;

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "library.db";

/// Maximum number of bound parameters used by a single `IN (...)` query.
pub(crate) const IN_CHUNK: usize = 500;

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// Connections use WAL journaling and a busy timeout so concurrent writers
/// from the batch executor wait for the lock instead of failing, and foreign
/// keys are enforced.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> sqlx::Result<SqlitePool> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let options = SqliteConnectOptions::from_str(db_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(15))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Row counts per table, used for summaries and idempotence checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CatalogCounts {
    pub tracks: i64,
    pub albums: i64,
    pub artists: i64,
    pub file_nodes: i64,
    pub invalid_tracks: i64,
}

/// Count the rows of every catalog table.
pub async fn catalog_counts(pool: &SqlitePool) -> sqlx::Result<CatalogCounts> {
    let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM tracks),
            (SELECT COUNT(*) FROM albums),
            (SELECT COUNT(*) FROM artists),
            (SELECT COUNT(*) FROM file_nodes),
            (SELECT COUNT(*) FROM invalid_tracks)
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(CatalogCounts {
        tracks: row.0,
        albums: row.1,
        artists: row.2,
        file_nodes: row.3,
        invalid_tracks: row.4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}", db_path.display());

        let pool = init_db(&db_url).await.expect("Failed to init db");
        assert!(db_path.exists());

        let counts = catalog_counts(&pool).await.unwrap();
        assert_eq!(counts, CatalogCounts::default());
    }

    #[tokio::test]
    async fn test_init_db_is_reentrant() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_url = db_url(Some(&temp_dir.path().join("again.db")));

        let pool = init_db(&db_url).await.unwrap();
        pool.close().await;

        // Migrations already applied; reopening must not fail.
        let pool = init_db(&db_url).await.unwrap();
        assert_eq!(catalog_counts(&pool).await.unwrap().tracks, 0);
    }

    #[test]
    fn test_db_url() {
        assert_eq!(db_url(None), "sqlite:library.db");
        assert_eq!(
            db_url(Some(std::path::Path::new("/tmp/x.db"))),
            "sqlite:/tmp/x.db"
        );
    }
}
