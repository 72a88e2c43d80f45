//! Track persistence.
//!
//! Tracks are keyed by their `file://` URI. Re-indexing the same URI updates
//! the existing row in place, so the database ID, favorite flag, play count
//! and hidden state survive rescans.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;

use super::IN_CHUNK;
use crate::model::Track;

const TRACK_COLUMNS: &str = "id, uri, name, artist_name, album_id, disc, track, duration, year, \
     embedded_artwork, alt_artwork, is_favorite, play_count, last_played_at, hidden, hidden_at, \
     modification_time, fetched_art";

/// Indexed fields of a track, as produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub uri: String,
    pub name: String,
    pub artist_name: Option<String>,
    pub album_id: Option<i64>,
    pub disc: Option<i64>,
    pub track: Option<i64>,
    pub duration: i64,
    pub year: Option<i64>,
    pub modification_time: i64,
}

/// Minimal track info used by the artwork pass.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ArtCandidate {
    pub id: i64,
    pub uri: String,
    pub album_id: Option<i64>,
}

/// Insert or update a track record.
///
/// Uses SQLite's UPSERT keyed on `uri`. Only indexed fields are overwritten;
/// user state (favorite, play count, hidden) is left untouched. The
/// `fetched_art` flag is reset so the artwork pass looks at the file again.
///
/// # Arguments
///
/// * `conn` - Connection or transaction to write through
/// * `record` - Extracted track fields
///
/// # Returns
///
/// The database ID of the inserted or updated track.
pub async fn upsert_track(conn: &mut SqliteConnection, record: &TrackRecord) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tracks (uri, name, artist_name, album_id, disc, track, duration, year, modification_time, fetched_art)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        ON CONFLICT(uri) DO UPDATE SET
            name = excluded.name,
            artist_name = excluded.artist_name,
            album_id = excluded.album_id,
            disc = excluded.disc,
            track = excluded.track,
            duration = excluded.duration,
            year = excluded.year,
            modification_time = excluded.modification_time,
            fetched_art = 0
        RETURNING id
        "#,
    )
    .bind(&record.uri)
    .bind(&record.name)
    .bind(&record.artist_name)
    .bind(record.album_id)
    .bind(record.disc)
    .bind(record.track)
    .bind(record.duration)
    .bind(record.year)
    .bind(record.modification_time)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0)
}

/// Get all tracks, hidden ones included.
pub async fn get_all_tracks(pool: &SqlitePool) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id"))
        .fetch_all(pool)
        .await
}

/// Get a track by its URI, hidden or not.
pub async fn get_track_by_uri(pool: &SqlitePool, uri: &str) -> sqlx::Result<Option<Track>> {
    sqlx::query_as::<_, Track>(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE uri = ?"))
        .bind(uri)
        .fetch_optional(pool)
        .await
}

/// Whether a track with this URI exists.
pub async fn track_exists(pool: &SqlitePool, uri: &str) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM tracks WHERE uri = ?")
        .bind(uri)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Fetch tracks for many URIs at once, keyed by URI.
///
/// Includes hidden tracks. URIs without a track are simply absent from the
/// returned map; callers decide ordering.
pub async fn get_tracks_by_uris(
    pool: &SqlitePool,
    uris: &[String],
) -> sqlx::Result<HashMap<String, Track>> {
    let mut found = HashMap::with_capacity(uris.len());

    for chunk in uris.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE uri IN ({placeholders})");
        let mut query = sqlx::query_as::<_, Track>(&sql);
        for uri in chunk {
            query = query.bind(uri);
        }
        for track in query.fetch_all(pool).await? {
            found.insert(track.uri.clone(), track);
        }
    }

    Ok(found)
}

/// Map of every catalogued URI to its stored modification time.
///
/// Used by incremental rescans to skip files that haven't changed.
pub async fn get_track_mtimes(pool: &SqlitePool) -> sqlx::Result<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT uri, modification_time FROM tracks")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Every catalogued track URI.
pub async fn get_all_uris(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT uri FROM tracks ORDER BY uri")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(uri,)| uri).collect())
}

/// Delete a track and its playlist-junction rows.
///
/// Both deletes run in one transaction. Returns whether a track was removed.
pub async fn delete_track_by_uri(pool: &SqlitePool, uri: &str) -> sqlx::Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM tracks_to_playlists WHERE track_id IN (SELECT id FROM tracks WHERE uri = ?)",
    )
    .bind(uri)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM tracks WHERE uri = ?")
        .bind(uri)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Tracks located directly inside a folder, excluding hidden tracks.
///
/// `prefix` is the folder's URI prefix (`file:///Music/Rock/`); tracks in
/// subfolders are not returned. Ordered case-insensitively by name, with
/// uppercase first on ties.
pub async fn get_folder_tracks(pool: &SqlitePool, prefix: &str) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(&format!(
        r#"
        SELECT {TRACK_COLUMNS} FROM tracks
        WHERE substr(uri, 1, length(?1)) = ?1
          AND instr(substr(uri, length(?1) + 1), '/') = 0
          AND hidden = 0
        ORDER BY name COLLATE NOCASE ASC, name ASC
        "#
    ))
    .bind(prefix)
    .fetch_all(pool)
    .await
}

/// Point every track of the `from` albums at album `to`.
pub async fn reassign_album(
    conn: &mut SqliteConnection,
    from: &[i64],
    to: i64,
) -> sqlx::Result<u64> {
    let mut moved = 0;
    for chunk in from.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("UPDATE tracks SET album_id = ? WHERE album_id IN ({placeholders})");
        let mut query = sqlx::query(&sql).bind(to);
        for id in chunk {
            query = query.bind(id);
        }
        moved += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(moved)
}

/// Mark tracks whose artwork is already known as checked.
///
/// A track is covered when it has embedded artwork or its album does.
pub async fn mark_covered_tracks_checked(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE tracks SET fetched_art = 1
        WHERE fetched_art = 0
          AND (embedded_artwork IS NOT NULL
               OR album_id IN (SELECT id FROM albums WHERE artwork IS NOT NULL))
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Tracks the artwork pass hasn't looked at yet, grouped by album.
pub async fn get_tracks_needing_art(pool: &SqlitePool) -> sqlx::Result<Vec<ArtCandidate>> {
    sqlx::query_as::<_, ArtCandidate>(
        "SELECT id, uri, album_id FROM tracks WHERE fetched_art = 0 ORDER BY album_id, disc, track, id",
    )
    .fetch_all(pool)
    .await
}

pub async fn set_fetched_art(pool: &SqlitePool, track_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE tracks SET fetched_art = 1 WHERE id = ?")
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_embedded_artwork(
    pool: &SqlitePool,
    track_id: i64,
    artwork: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE tracks SET embedded_artwork = ?, fetched_art = 1 WHERE id = ?")
        .bind(artwork)
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hide or unhide a track. Hidden tracks stay catalogued but are left out
/// of folder listings.
pub async fn set_hidden(pool: &SqlitePool, track_id: i64, hidden: bool) -> sqlx::Result<()> {
    let hidden_at = hidden.then(|| chrono::Utc::now().timestamp_millis());
    sqlx::query("UPDATE tracks SET hidden = ?, hidden_at = ? WHERE id = ?")
        .bind(hidden)
        .bind(hidden_at)
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}
