//! Album persistence.
//!
//! An album is identified by `(name, artist_name)`. The release year is
//! descriptive only and is never part of a lookup, so a missing year can't
//! split one album into several rows. Legacy rows may still hold a NULL
//! year; every read coalesces it to [`UNKNOWN_YEAR`].

use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;

use super::IN_CHUNK;
use crate::model::{Album, UNKNOWN_YEAR};

const ALBUM_COLUMNS: &str = "id, name, artist_name, COALESCE(release_year, -1) AS release_year, \
     artwork, alt_artwork";

/// Get or create an album by name and album artist.
///
/// If several rows share the key (a fractured album not yet repaired) the
/// oldest one is used. When the stored year is unknown and `year` is known,
/// the year is filled in.
///
/// The album artist row must already exist.
///
/// # Returns
///
/// The database ID of the (existing or new) album.
pub async fn get_or_create_album(
    pool: &SqlitePool,
    name: &str,
    artist_name: &str,
    year: Option<i64>,
) -> sqlx::Result<i64> {
    let year = year.unwrap_or(UNKNOWN_YEAR);

    if let Some((id, stored_year)) = find_album(pool, name, artist_name).await? {
        if stored_year == UNKNOWN_YEAR && year != UNKNOWN_YEAR {
            sqlx::query("UPDATE OR IGNORE albums SET release_year = ? WHERE id = ?")
                .bind(year)
                .bind(id)
                .execute(pool)
                .await?;
        }
        return Ok(id);
    }

    let inserted: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO albums (name, artist_name, release_year)
        VALUES (?, ?, ?)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(artist_name)
    .bind(year)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some((id,)) => Ok(id),
        // Lost a race with a concurrent insert of the same key.
        None => find_album(pool, name, artist_name)
            .await?
            .map(|(id, _)| id)
            .ok_or(sqlx::Error::RowNotFound),
    }
}

async fn find_album(
    pool: &SqlitePool,
    name: &str,
    artist_name: &str,
) -> sqlx::Result<Option<(i64, i64)>> {
    sqlx::query_as(
        r#"
        SELECT id, COALESCE(release_year, -1) FROM albums
        WHERE name = ? AND artist_name = ?
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(name)
    .bind(artist_name)
    .fetch_optional(pool)
    .await
}

pub async fn get_album(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Album>> {
    sqlx::query_as::<_, Album>(&format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_all_albums(pool: &SqlitePool) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>(&format!("SELECT {ALBUM_COLUMNS} FROM albums ORDER BY id"))
        .fetch_all(pool)
        .await
}

/// Albums whose year is unknown (sentinel or legacy NULL), oldest first.
pub async fn get_unknown_year_albums(pool: &SqlitePool) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>(&format!(
        "SELECT {ALBUM_COLUMNS} FROM albums WHERE release_year IS NULL OR release_year = ? ORDER BY id"
    ))
    .bind(UNKNOWN_YEAR)
    .fetch_all(pool)
    .await
}

/// Number of tracks pointing at an album.
pub async fn count_album_tracks(pool: &SqlitePool, id: i64) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks WHERE album_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn delete_albums(conn: &mut SqliteConnection, ids: &[i64]) -> sqlx::Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("DELETE FROM albums WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        deleted += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(deleted)
}

/// Give album `to` the artwork of one of the `from` albums if it has none.
pub async fn adopt_artwork(conn: &mut SqliteConnection, to: i64, from: &[i64]) -> sqlx::Result<()> {
    for chunk in from.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "UPDATE albums SET artwork = (SELECT artwork FROM albums \
             WHERE id IN ({placeholders}) AND artwork IS NOT NULL ORDER BY id LIMIT 1) \
             WHERE id = ? AND artwork IS NULL"
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        query.bind(to).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Replace legacy NULL years with [`UNKNOWN_YEAR`].
///
/// Rows that would collide with an existing sentinel row for the same key
/// are left alone; they belong to a group the repair pass couldn't merge.
pub async fn normalize_unknown_years(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query("UPDATE OR IGNORE albums SET release_year = ? WHERE release_year IS NULL")
        .bind(UNKNOWN_YEAR)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete albums that no track points at.
pub async fn delete_unused_albums(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM albums WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.album_id = albums.id)",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_album_artwork(pool: &SqlitePool, id: i64, artwork: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE albums SET artwork = ? WHERE id = ?")
        .bind(artwork)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
