//! Synchronization engine.
//!
//! Applies one pass's extraction results to the catalog:
//!
//! 1. Artists, then albums, are resolved once per distinct key.
//! 2. Tracks are upserted by URI in executor windows. Each track is its own
//!    unit of work; a write failure is recorded like an extraction failure.
//! 3. Failed files get an invalid-track row and lose any stale track row.
//! 4. Tracks catalogued before the pass whose URI wasn't found are deleted,
//!    along with their playlist entries.
//! 5. Albums and artists left without tracks are deleted.
//!
//! Nothing here runs inside a whole-pass transaction: every committed unit
//! stays valid if the process dies mid-pass.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::batch::{BatchExecutor, BatchPreset, CancelToken};
use crate::db::tracks::TrackRecord;
use crate::db::{albums, artists, invalid_tracks, tracks};
use crate::error::{Error, Result};
use crate::metadata::{AlbumKey, ExtractFailure, ExtractOutcome, ExtractedTrack};

/// What a synchronization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Tracks inserted or updated
    pub staged: usize,
    /// Files recorded as invalid (extraction or write failures)
    pub errors: usize,
    /// Tracks deleted because their file is gone
    pub removed: usize,
    pub albums_removed: u64,
    pub artists_removed: u64,
}

/// Failure to persist one track, recorded as an invalid track.
#[derive(Debug)]
struct WriteFailure {
    uri: String,
    modified: i64,
    error: Error,
}

/// Apply extraction results to the catalog.
///
/// `found` holds every URI seen by the crawler this pass, including files
/// whose extraction was skipped because they were unchanged. Catalogued
/// tracks outside it are deleted.
///
/// `on_window` receives running `(staged, errors)` totals as track writes
/// complete.
pub async fn synchronize(
    pool: &SqlitePool,
    outcomes: Vec<ExtractOutcome>,
    found: &HashSet<String>,
    cancel: Option<CancelToken>,
    mut on_window: impl FnMut(usize, usize),
) -> Result<SyncReport> {
    let existing: HashSet<String> = tracks::get_track_mtimes(pool).await?.into_keys().collect();

    let mut extracted = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            ExtractOutcome::Extracted(track) => extracted.push(track),
            ExtractOutcome::Failed(failure) => failures.push(failure),
            ExtractOutcome::TooShort { .. } => {}
        }
    }

    let album_ids = resolve_albums(pool, &extracted).await?;

    let mut executor = BatchExecutor::new(BatchPreset::Light);
    if let Some(token) = cancel.clone() {
        executor = executor.with_cancel(token);
    }

    let mut report = SyncReport {
        errors: failures.len(),
        ..SyncReport::default()
    };
    let album_ids = &album_ids;
    let outcome = executor
        .run_with_progress(
            extracted,
            |track| async move { write_track(pool, album_ids, track).await },
            |window| {
                report.staged += window.fulfilled.len();
                report.errors += window.rejected.len();
                on_window(report.staged, report.errors);
            },
        )
        .await;
    if outcome.was_cancelled() {
        return Err(Error::Cancelled);
    }

    let (_, write_failures) = outcome.partition();
    for failure in write_failures {
        tracing::warn!(target: "sync", uri = %failure.uri, error = %failure.error, "Track write failed");
        failures.push(ExtractFailure {
            uri: failure.uri,
            modified: failure.modified,
            error_name: failure.error.kind().to_string(),
            message: failure.error.to_string(),
        });
    }
    record_failures(pool, failures).await?;

    let removed: Vec<String> = existing.difference(found).cloned().collect();
    report.removed = delete_removed(pool, removed, cancel).await?;

    let vanished: Vec<String> = invalid_tracks::get_invalid_uris(pool)
        .await?
        .into_iter()
        .filter(|uri| !found.contains(uri))
        .collect();
    let mut conn = pool.acquire().await?;
    for uri in vanished {
        invalid_tracks::delete_invalid_track(&mut conn, &uri).await?;
    }
    drop(conn);

    report.albums_removed = albums::delete_unused_albums(pool).await?;
    report.artists_removed = artists::delete_unused_artists(pool).await?;

    tracing::debug!(target: "sync", ?report, "Synchronization complete");
    Ok(report)
}

/// Ensure every artist and album referenced by `extracted` exists.
///
/// Runs serially: each distinct key is resolved once, so tracks of one
/// album never race to create it. When an album's tracks disagree on the
/// year, the earliest known year wins.
async fn resolve_albums(
    pool: &SqlitePool,
    extracted: &[ExtractedTrack],
) -> Result<HashMap<AlbumKey, i64>> {
    let mut artist_names: Vec<&str> = Vec::new();
    let mut seen_artists = HashSet::new();
    let mut years: HashMap<&AlbumKey, Option<i64>> = HashMap::new();
    let mut order: Vec<&AlbumKey> = Vec::new();

    for track in extracted {
        let mut names = vec![track.artist_name.as_str()];
        if let Some(album) = &track.album {
            names.push(album.artist_name.as_str());
            let year = years.entry(album).or_insert_with(|| {
                order.push(album);
                None
            });
            *year = match (*year, track.year) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        for name in names {
            if seen_artists.insert(name) {
                artist_names.push(name);
            }
        }
    }

    for name in artist_names {
        artists::ensure_artist(pool, name).await?;
    }

    let mut ids = HashMap::with_capacity(order.len());
    for key in order {
        let year = years.get(key).copied().flatten();
        let id = albums::get_or_create_album(pool, &key.name, &key.artist_name, year).await?;
        ids.insert(key.clone(), id);
    }
    Ok(ids)
}

/// Upsert one track and clear its invalid-track row.
async fn write_track(
    pool: &SqlitePool,
    album_ids: &HashMap<AlbumKey, i64>,
    track: ExtractedTrack,
) -> std::result::Result<i64, WriteFailure> {
    let record = TrackRecord {
        uri: track.uri.clone(),
        name: track.name,
        artist_name: Some(track.artist_name),
        album_id: track.album.as_ref().and_then(|key| album_ids.get(key).copied()),
        disc: track.disc,
        track: track.track,
        duration: track.duration,
        year: track.year,
        modification_time: track.modified,
    };

    // Both statements go through one connection; a window holds far more
    // tasks than the pool has connections.
    let write = async {
        let mut tx = pool.begin().await?;
        let id = tracks::upsert_track(&mut *tx, &record).await?;
        invalid_tracks::delete_invalid_track(&mut *tx, &record.uri).await?;
        tx.commit().await?;
        Ok::<_, Error>(id)
    };

    write.await.map_err(|error| WriteFailure {
        uri: track.uri,
        modified: track.modified,
        error,
    })
}

/// Store failure records and drop stale track rows for failed files.
async fn record_failures(pool: &SqlitePool, failures: Vec<ExtractFailure>) -> Result<()> {
    let outcome = BatchExecutor::new(BatchPreset::Light)
        .run(failures, |failure| async move {
            invalid_tracks::upsert_invalid_track(
                pool,
                &failure.uri,
                Some(&failure.error_name),
                &failure.message,
                failure.modified,
            )
            .await?;
            tracks::delete_track_by_uri(pool, &failure.uri).await?;
            Ok::<_, Error>(())
        })
        .await;

    let (_, errors) = outcome.partition();
    if let Some(e) = errors.into_iter().next() {
        return Err(e.context("recording invalid tracks"));
    }
    Ok(())
}

/// Delete tracks whose files disappeared.
async fn delete_removed(
    pool: &SqlitePool,
    removed: Vec<String>,
    cancel: Option<CancelToken>,
) -> Result<usize> {
    if removed.is_empty() {
        return Ok(0);
    }
    tracing::info!(target: "sync", count = removed.len(), "Removing tracks no longer on disk");

    let mut executor = BatchExecutor::new(BatchPreset::Moderate);
    if let Some(token) = cancel {
        executor = executor.with_cancel(token);
    }
    let outcome = executor
        .run(removed, |uri| async move {
            tracks::delete_track_by_uri(pool, &uri).await
        })
        .await;
    if outcome.was_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut deleted = 0;
    for result in outcome.results {
        match result {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(target: "sync", error = %e, "Failed to delete removed track"),
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::playlists;
    use crate::test_utils::{MOCK_MTIME, temp_db};

    fn extracted(uri: &str, name: &str, artist: &str, album: Option<&str>) -> ExtractOutcome {
        ExtractOutcome::Extracted(ExtractedTrack {
            uri: uri.to_string(),
            modified: MOCK_MTIME,
            name: name.to_string(),
            artist_name: artist.to_string(),
            album: album.map(|name| AlbumKey {
                name: name.to_string(),
                artist_name: artist.to_string(),
            }),
            year: None,
            track: None,
            disc: None,
            duration: 200,
        })
    }

    fn failed(uri: &str, message: &str) -> ExtractOutcome {
        ExtractOutcome::Failed(ExtractFailure {
            uri: uri.to_string(),
            modified: MOCK_MTIME,
            error_name: "MetadataError".to_string(),
            message: message.to_string(),
        })
    }

    fn found(outcomes: &[ExtractOutcome]) -> HashSet<String> {
        outcomes.iter().map(|o| o.uri().to_string()).collect()
    }

    async fn sync(pool: &SqlitePool, outcomes: Vec<ExtractOutcome>) -> SyncReport {
        let found = found(&outcomes);
        synchronize(pool, outcomes, &found, None, |_, _| {})
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_tracks_create_artists_and_albums() {
        let (pool, _dir) = temp_db().await;
        let report = sync(
            &pool,
            vec![
                extracted("file:///m/1.mp3", "One", "Band", Some("LP")),
                extracted("file:///m/2.mp3", "Two", "Band", Some("LP")),
                extracted("file:///m/3.mp3", "Three", "Solo", None),
            ],
        )
        .await;

        assert_eq!(report.staged, 3);
        assert_eq!(report.errors, 0);
        let counts = crate::db::catalog_counts(&pool).await.unwrap();
        assert_eq!((counts.tracks, counts.albums, counts.artists), (3, 1, 2));
    }

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        let (pool, _dir) = temp_db().await;
        let outcomes = vec![
            extracted("file:///m/1.mp3", "One", "Band", Some("LP")),
            extracted("file:///m/2.mp3", "Two", "Band", Some("LP")),
        ];

        sync(&pool, outcomes.clone()).await;
        let before = tracks::get_all_tracks(&pool).await.unwrap();
        let report = sync(&pool, outcomes).await;
        let after = tracks::get_all_tracks(&pool).await.unwrap();

        assert_eq!(before, after);
        assert_eq!(report.removed, 0);
        assert_eq!(albums::get_all_albums(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_files_are_purged_with_playlist_rows() {
        let (pool, _dir) = temp_db().await;
        sync(
            &pool,
            vec![
                extracted("file:///m/keep.mp3", "Keep", "A", Some("Kept")),
                extracted("file:///m/gone.mp3", "Gone", "B", Some("Lost")),
            ],
        )
        .await;
        let gone = tracks::get_track_by_uri(&pool, "file:///m/gone.mp3")
            .await
            .unwrap()
            .unwrap();
        playlists::create_playlist(&pool, "Mix", &[gone.id]).await.unwrap();

        let report = sync(
            &pool,
            vec![extracted("file:///m/keep.mp3", "Keep", "A", Some("Kept"))],
        )
        .await;

        assert_eq!(report.removed, 1);
        assert_eq!(report.albums_removed, 1);
        assert_eq!(report.artists_removed, 1);
        assert!(playlists::get_playlist_tracks(&pool, "Mix").await.unwrap().is_empty());
        let artists: Vec<String> = artists::get_all_artists(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(artists, vec!["A"]);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_then_cleared() {
        let (pool, _dir) = temp_db().await;
        sync(&pool, vec![extracted("file:///m/x.mp3", "X", "A", None)]).await;

        // The file went bad: its track row goes, an invalid row appears.
        let report = sync(&pool, vec![failed("file:///m/x.mp3", "corrupt")]).await;
        assert_eq!(report.errors, 1);
        assert!(!tracks::track_exists(&pool, "file:///m/x.mp3").await.unwrap());
        let invalid = invalid_tracks::get_invalid_tracks(&pool).await.unwrap();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].error_message, "corrupt");
        assert_eq!(invalid[0].error_name.as_deref(), Some("MetadataError"));

        // Fixed again.
        sync(&pool, vec![extracted("file:///m/x.mp3", "X", "A", None)]).await;
        assert!(invalid_tracks::get_invalid_tracks(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_rows_for_vanished_files_are_dropped() {
        let (pool, _dir) = temp_db().await;
        sync(&pool, vec![failed("file:///m/bad.mp3", "corrupt")]).await;
        sync(&pool, vec![]).await;
        assert!(invalid_tracks::get_invalid_tracks(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_too_short_files_are_not_catalogued() {
        let (pool, _dir) = temp_db().await;
        let report = sync(
            &pool,
            vec![ExtractOutcome::TooShort {
                uri: "file:///m/jingle.mp3".into(),
            }],
        )
        .await;

        assert_eq!(report, SyncReport::default());
        assert!(tracks::get_all_tracks(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_earliest_year_wins_within_pass() {
        let (pool, _dir) = temp_db().await;
        let with_year = |uri: &str, year| match extracted(uri, "T", "A", Some("LP")) {
            ExtractOutcome::Extracted(t) => ExtractOutcome::Extracted(ExtractedTrack { year, ..t }),
            other => other,
        };
        sync(
            &pool,
            vec![
                with_year("file:///m/1.mp3", Some(2001)),
                with_year("file:///m/2.mp3", None),
                with_year("file:///m/3.mp3", Some(1999)),
            ],
        )
        .await;

        let all = albums::get_all_albums(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].release_year, 1999);
    }

    #[tokio::test]
    async fn test_window_callback_reports_totals() {
        let (pool, _dir) = temp_db().await;
        let outcomes = vec![
            extracted("file:///m/1.mp3", "One", "A", None),
            failed("file:///m/2.mp3", "bad"),
        ];
        let found = found(&outcomes);
        let mut seen = Vec::new();
        synchronize(&pool, outcomes, &found, None, |staged, errors| {
            seen.push((staged, errors))
        })
        .await
        .unwrap();
        assert_eq!(seen, vec![(1, 1)]);
    }
    #[tokio::test]
    async fn test_window_larger_than_pool_writes_every_track() {
        let (pool, _dir) = temp_db().await;
        let outcomes: Vec<ExtractOutcome> = (0..60)
            .map(|i| extracted(&format!("file:///m/{i:02}.mp3"), "T", "A", Some("LP")))
            .collect();
        // Earlier failures for some of the files, cleared by the same writes.
        for outcome in outcomes.iter().step_by(7) {
            invalid_tracks::upsert_invalid_track(&pool, outcome.uri(), None, "old", 1)
                .await
                .unwrap();
        }
        let first_ids: HashMap<String, i64> = {
            sync(&pool, outcomes.clone()).await;
            tracks::get_all_tracks(&pool)
                .await
                .unwrap()
                .into_iter()
                .map(|t| (t.uri, t.id))
                .collect()
        };

        let report = tokio::time::timeout(std::time::Duration::from_secs(20), sync(&pool, outcomes))
            .await
            .expect("synchronize stalled");

        assert_eq!(report.staged, 60);
        assert_eq!(report.errors, 0);
        assert_eq!(report.removed, 0);
        let stored = tracks::get_all_tracks(&pool).await.unwrap();
        assert_eq!(stored.len(), 60);
        assert!(stored.iter().all(|t| first_ids.get(&t.uri) == Some(&t.id)));
        assert!(invalid_tracks::get_invalid_tracks(&pool).await.unwrap().is_empty());
    }
}
