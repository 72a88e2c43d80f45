//! Artwork references held by catalog rows.

use std::collections::HashSet;

use sqlx::sqlite::SqlitePool;

/// Every non-null artwork path referenced by a track, album, artist or
/// playlist row.
pub async fn get_referenced_artwork(pool: &SqlitePool) -> sqlx::Result<HashSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT embedded_artwork FROM tracks WHERE embedded_artwork IS NOT NULL
        UNION SELECT alt_artwork FROM tracks WHERE alt_artwork IS NOT NULL
        UNION SELECT artwork FROM albums WHERE artwork IS NOT NULL
        UNION SELECT alt_artwork FROM albums WHERE alt_artwork IS NOT NULL
        UNION SELECT artwork FROM artists WHERE artwork IS NOT NULL
        UNION SELECT artwork FROM playlists WHERE artwork IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(path,)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_mock_track, temp_db};

    #[tokio::test]
    async fn test_collects_all_reference_columns() {
        let (pool, _dir) = temp_db().await;
        let id = insert_mock_track(&pool, "file:///a.mp3").await;

        sqlx::query("UPDATE tracks SET embedded_artwork = '/art/t.jpg', alt_artwork = '/art/t2.jpg' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE albums SET artwork = '/art/al.jpg'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE artists SET artwork = '/art/ar.jpg'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO playlists (name, artwork) VALUES ('Mix', '/art/p.jpg')")
            .execute(&pool)
            .await
            .unwrap();

        let used = get_referenced_artwork(&pool).await.unwrap();
        assert_eq!(used.len(), 5);
        for path in ["/art/t.jpg", "/art/t2.jpg", "/art/al.jpg", "/art/ar.jpg", "/art/p.jpg"] {
            assert!(used.contains(path), "missing {path}");
        }
    }
}
