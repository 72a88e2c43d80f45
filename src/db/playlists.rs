//! Playlist persistence.

use sqlx::sqlite::SqlitePool;

use crate::model::{Playlist, Track};

/// Create (or replace the contents of) a playlist with tracks in order.
///
/// A track listed twice keeps its first position.
pub async fn create_playlist(pool: &SqlitePool, name: &str, track_ids: &[i64]) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO playlists (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM tracks_to_playlists WHERE playlist_name = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;

    for (position, id) in track_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO tracks_to_playlists (track_id, playlist_name, position) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_playlists(pool: &SqlitePool) -> sqlx::Result<Vec<Playlist>> {
    sqlx::query_as::<_, Playlist>("SELECT name, artwork, is_favorite FROM playlists ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Tracks of a playlist in their saved order.
pub async fn get_playlist_tracks(pool: &SqlitePool, name: &str) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(
        r#"
        SELECT t.id, t.uri, t.name, t.artist_name, t.album_id, t.disc, t.track, t.duration, t.year,
               t.embedded_artwork, t.alt_artwork, t.is_favorite, t.play_count, t.last_played_at,
               t.hidden, t.hidden_at, t.modification_time, t.fetched_art
        FROM tracks_to_playlists tp
        JOIN tracks t ON t.id = tp.track_id
        WHERE tp.playlist_name = ?
        ORDER BY tp.position
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
}
