//! Diagnostic records for files that failed to index.

use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;

use crate::model::InvalidTrack;

/// Record a failure for `uri`, replacing any earlier error for it.
pub async fn upsert_invalid_track(
    pool: &SqlitePool,
    uri: &str,
    error_name: Option<&str>,
    error_message: &str,
    modification_time: i64,
) -> sqlx::Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    sqlx::query(
        r#"
        INSERT INTO invalid_tracks (uri, error_name, error_message, modification_time, discovered_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(uri) DO UPDATE SET
            error_name = excluded.error_name,
            error_message = excluded.error_message,
            modification_time = excluded.modification_time,
            discovered_at = excluded.discovered_at
        "#,
    )
    .bind(uri)
    .bind(error_name)
    .bind(error_message)
    .bind(modification_time)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear a stale failure once the file indexes successfully.
///
/// Takes a connection so it can share the track write's transaction.
pub async fn delete_invalid_track(conn: &mut SqliteConnection, uri: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM invalid_tracks WHERE uri = ?")
        .bind(uri)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_invalid_tracks(pool: &SqlitePool) -> sqlx::Result<Vec<InvalidTrack>> {
    sqlx::query_as::<_, InvalidTrack>(
        "SELECT uri, error_name, error_message, modification_time, discovered_at FROM invalid_tracks ORDER BY uri",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_invalid_uris(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT uri FROM invalid_tracks")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(uri,)| uri).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    #[tokio::test]
    async fn test_upsert_replaces_previous_error() {
        let (pool, _dir) = temp_db().await;

        upsert_invalid_track(&pool, "file:///bad.mp3", Some("MetadataError"), "first", 1)
            .await
            .unwrap();
        upsert_invalid_track(&pool, "file:///bad.mp3", Some("IoError"), "second", 2)
            .await
            .unwrap();

        let rows = get_invalid_tracks(&pool).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].error_message, "second");
        assert_eq!(rows[0].error_name.as_deref(), Some("IoError"));
        assert_eq!(rows[0].modification_time, 2);
    }

    #[tokio::test]
    async fn test_delete_invalid_track() {
        let (pool, _dir) = temp_db().await;
        upsert_invalid_track(&pool, "file:///bad.mp3", None, "oops", 1)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(delete_invalid_track(&mut conn, "file:///bad.mp3").await.unwrap());
        assert!(!delete_invalid_track(&mut conn, "file:///bad.mp3").await.unwrap());
        drop(conn);
        assert!(get_invalid_uris(&pool).await.unwrap().is_empty());
    }
}
