//! Artist persistence. Artists are identified by name alone.

use sqlx::sqlite::SqlitePool;

use crate::model::Artist;

/// Create the artist if it doesn't exist yet. Idempotent.
pub async fn ensure_artist(pool: &SqlitePool, name: &str) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO artists (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_all_artists(pool: &SqlitePool) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>("SELECT name, artwork FROM artists ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Delete artists with neither tracks nor albums.
///
/// Run after [`super::albums::delete_unused_albums`] so artists of removed
/// albums are collected in the same pass.
pub async fn delete_unused_artists(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM artists
        WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.artist_name = artists.name)
          AND NOT EXISTS (SELECT 1 FROM albums WHERE albums.artist_name = artists.name)
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_mock_track, temp_db};

    #[tokio::test]
    async fn test_ensure_artist_is_idempotent() {
        let (pool, _dir) = temp_db().await;
        ensure_artist(&pool, "Queen").await.unwrap();
        ensure_artist(&pool, "Queen").await.unwrap();
        assert_eq!(get_all_artists(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unused_artists_keeps_referenced() {
        let (pool, _dir) = temp_db().await;
        insert_mock_track(&pool, "file:///a.mp3").await;
        ensure_artist(&pool, "Orphan").await.unwrap();

        assert_eq!(delete_unused_artists(&pool).await.unwrap(), 1);
        let names: Vec<_> = get_all_artists(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Test Artist".to_string()]);
    }
}
