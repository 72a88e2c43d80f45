//! Materialized folder tree.
//!
//! Node paths exclude the `file:///` prefix and end with `/`. Listings are
//! ordered case-insensitively by name; ties sort uppercase first, which
//! `NOCASE` followed by the default binary collation reproduces.

use sqlx::sqlite::SqlitePool;

use crate::model::FileNode;

/// Insert nodes, fixing the parent link and name of any that already exist.
///
/// Parents must come before their children. All nodes are written in one
/// transaction; callers pass a bounded window of nodes.
pub async fn upsert_file_nodes(pool: &SqlitePool, nodes: &[FileNode]) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for node in nodes {
        written += sqlx::query(
            r#"
            INSERT INTO file_nodes (path, parent_path, name) VALUES (?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                parent_path = excluded.parent_path,
                name = excluded.name
            WHERE parent_path IS NOT excluded.parent_path OR name IS NOT excluded.name
            "#,
        )
        .bind(&node.path)
        .bind(&node.parent_path)
        .bind(&node.name)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Delete every node with no track at or under its path.
pub async fn prune_file_nodes(pool: &SqlitePool) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM file_nodes
        WHERE NOT EXISTS (
            SELECT 1 FROM tracks
            WHERE substr(tracks.uri, 1, length('file:///' || file_nodes.path)) = 'file:///' || file_nodes.path
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Children of `parent` (root nodes when `None`) that still hold at least one
/// visible track.
pub async fn get_subdirectories(
    pool: &SqlitePool,
    parent: Option<&str>,
) -> sqlx::Result<Vec<FileNode>> {
    sqlx::query_as::<_, FileNode>(
        r#"
        SELECT path, parent_path, name FROM file_nodes
        WHERE parent_path IS ?
          AND EXISTS (
            SELECT 1 FROM tracks
            WHERE tracks.hidden = 0
              AND substr(tracks.uri, 1, length('file:///' || file_nodes.path)) = 'file:///' || file_nodes.path
          )
        ORDER BY name COLLATE NOCASE ASC, name ASC
        "#,
    )
    .bind(parent)
    .fetch_all(pool)
    .await
}

pub async fn get_all_file_nodes(pool: &SqlitePool) -> sqlx::Result<Vec<FileNode>> {
    sqlx::query_as::<_, FileNode>("SELECT path, parent_path, name FROM file_nodes ORDER BY path")
        .fetch_all(pool)
        .await
}
