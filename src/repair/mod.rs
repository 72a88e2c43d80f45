//! Album fracturization repair.
//!
//! Legacy rows with a NULL release year never compare equal to each other,
//! so the same album could be created more than once. This pass merges every
//! group of unknown-year albums sharing `(name, artist_name)` into its oldest
//! row, then rewrites the remaining NULL years to the sentinel.
//!
//! Each group is merged in its own transaction. A group that fails is
//! logged and left for the next pass. Running the pass twice is a no-op.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::db::{albums, tracks};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Groups with more than one row
    pub groups: usize,
    /// Duplicate rows deleted
    pub merged: usize,
    /// Tracks re-pointed at a surviving row
    pub tracks_moved: u64,
    /// Groups skipped after an error
    pub failed_groups: usize,
    /// NULL years rewritten to the sentinel
    pub normalized: u64,
}

/// Merge duplicate unknown-year albums.
pub async fn repair_albums(pool: &SqlitePool) -> Result<RepairReport> {
    let candidates = albums::get_unknown_year_albums(pool).await?;

    // Rows arrive ordered by id, so the first id of each group is the oldest.
    let mut groups: HashMap<(String, String), Vec<i64>> = HashMap::new();
    let mut order = Vec::new();
    for album in candidates {
        let key = (album.name, album.artist_name);
        let ids = groups.entry(key.clone()).or_default();
        if ids.is_empty() {
            order.push(key);
        }
        ids.push(album.id);
    }

    let mut report = RepairReport::default();
    for key in order {
        let Some(ids) = groups.remove(&key) else {
            continue;
        };
        let Some((&canonical, duplicates)) = ids.split_first() else {
            continue;
        };
        if duplicates.is_empty() {
            continue;
        }
        report.groups += 1;

        match merge_group(pool, canonical, duplicates).await {
            Ok(moved) => {
                tracing::debug!(
                    target: "repair",
                    album = %key.0,
                    artist = %key.1,
                    canonical,
                    duplicates = duplicates.len(),
                    moved,
                    "Merged fractured album"
                );
                report.merged += duplicates.len();
                report.tracks_moved += moved;
            }
            Err(e) => {
                tracing::warn!(
                    target: "repair",
                    album = %key.0,
                    artist = %key.1,
                    error = %e,
                    "Failed to merge album group, skipping"
                );
                report.failed_groups += 1;
            }
        }
    }

    report.normalized = albums::normalize_unknown_years(pool).await?;

    if report.groups > 0 || report.normalized > 0 {
        tracing::info!(target: "repair", ?report, "Album repair complete");
    }
    Ok(report)
}

/// Re-point tracks and delete the duplicates, atomically.
async fn merge_group(pool: &SqlitePool, canonical: i64, duplicates: &[i64]) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;
    let moved = tracks::reassign_album(&mut *tx, duplicates, canonical).await?;
    albums::adopt_artwork(&mut *tx, canonical, duplicates).await?;
    albums::delete_albums(&mut *tx, duplicates).await?;
    tx.commit().await?;
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::artists::ensure_artist;
    use crate::db::tracks::{TrackRecord, upsert_track};
    use crate::model::UNKNOWN_YEAR;
    use crate::test_utils::{mock_track_record, temp_db};

    async fn legacy_album(pool: &SqlitePool, name: &str, artist: &str, year: Option<i64>) -> i64 {
        ensure_artist(pool, artist).await.unwrap();
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO albums (name, artist_name, release_year) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(artist)
        .bind(year)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }

    async fn add_tracks(pool: &SqlitePool, album_id: i64, prefix: &str, count: usize) {
        ensure_artist(pool, "Test Artist").await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        for i in 0..count {
            let record = TrackRecord {
                album_id: Some(album_id),
                ..mock_track_record(&format!("file:///m/{prefix}{i}.mp3"))
            };
            upsert_track(&mut conn, &record).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_greatest_hits_split_three_two_is_merged() {
        let (pool, _dir) = temp_db().await;
        let first = legacy_album(&pool, "Greatest Hits", "X", None).await;
        let second = legacy_album(&pool, "Greatest Hits", "X", None).await;
        add_tracks(&pool, first, "a", 3).await;
        add_tracks(&pool, second, "b", 2).await;

        let report = repair_albums(&pool).await.unwrap();

        assert_eq!(report.groups, 1);
        assert_eq!(report.merged, 1);
        assert_eq!(report.tracks_moved, 2);
        let all = albums::get_all_albums(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, first);
        assert_eq!(all[0].release_year, UNKNOWN_YEAR);
        assert_eq!(albums::count_album_tracks(&pool, first).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_null_and_sentinel_rows_merge() {
        let (pool, _dir) = temp_db().await;
        let sentinel = legacy_album(&pool, "Demos", "X", Some(UNKNOWN_YEAR)).await;
        let null = legacy_album(&pool, "Demos", "X", None).await;
        add_tracks(&pool, null, "n", 1).await;

        repair_albums(&pool).await.unwrap();

        let all = albums::get_all_albums(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, sentinel);
        assert_eq!(albums::count_album_tracks(&pool, sentinel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repair_is_idempotent() {
        let (pool, _dir) = temp_db().await;
        let a = legacy_album(&pool, "Greatest Hits", "X", None).await;
        let b = legacy_album(&pool, "Greatest Hits", "X", None).await;
        add_tracks(&pool, a, "a", 1).await;
        add_tracks(&pool, b, "b", 1).await;

        repair_albums(&pool).await.unwrap();
        let before = albums::get_all_albums(&pool).await.unwrap();
        let second = repair_albums(&pool).await.unwrap();

        assert_eq!(second, RepairReport::default());
        assert_eq!(albums::get_all_albums(&pool).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_distinct_keys_and_known_years_untouched() {
        let (pool, _dir) = temp_db().await;
        legacy_album(&pool, "Greatest Hits", "X", None).await;
        legacy_album(&pool, "Greatest Hits", "Y", None).await;
        legacy_album(&pool, "Greatest Hits", "X", Some(1990)).await;

        let report = repair_albums(&pool).await.unwrap();

        assert_eq!(report.groups, 0);
        assert_eq!(report.normalized, 2);
        assert_eq!(albums::get_all_albums(&pool).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_artwork_is_adopted() {
        let (pool, _dir) = temp_db().await;
        let a = legacy_album(&pool, "LP", "X", None).await;
        let b = legacy_album(&pool, "LP", "X", None).await;
        albums::set_album_artwork(&pool, b, "/art/b.jpg").await.unwrap();

        repair_albums(&pool).await.unwrap();

        let survivor = albums::get_album(&pool, a).await.unwrap().unwrap();
        assert_eq!(survivor.artwork.as_deref(), Some("/art/b.jpg"));
    }
}
