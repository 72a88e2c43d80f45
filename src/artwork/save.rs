//! Artwork save pass.
//!
//! Runs after synchronization and repair. Tracks whose artwork is already
//! known are marked checked; the rest are grouped by album and each album
//! takes the first cover any of its tracks yields. Tracks without an album
//! get their own embedded artwork.
//!
//! `fetched_art` is set before a file is opened, so a file that crashes the
//! reader is not retried on every pass. Re-indexing a track resets it.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::ArtworkStore;
use crate::batch::{BatchExecutor, BatchPreset, CancelToken};
use crate::db::{albums, tracks};
use crate::db::tracks::ArtCandidate;
use crate::error::{Error, Result};
use crate::metadata::MetadataSource;
use crate::uri;

/// What the save pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Tracks looked at
    pub checked: usize,
    /// Artwork files written
    pub saved: usize,
    /// Groups that failed with a database error
    pub failed: usize,
}

/// Tracks sharing an album, or a single album-less track.
struct Group {
    album_id: Option<i64>,
    tracks: Vec<ArtCandidate>,
}

/// Attach artwork to albums and album-less tracks that don't have any.
pub async fn save_artwork(
    pool: &SqlitePool,
    store: &ArtworkStore,
    source: Arc<dyn MetadataSource>,
    cancel: Option<CancelToken>,
) -> Result<SaveReport> {
    let covered = tracks::mark_covered_tracks_checked(pool).await?;
    let pending = tracks::get_tracks_needing_art(pool).await?;
    tracing::debug!(target: "artwork", covered, pending = pending.len(), "Artwork pass starting");

    let groups = group_by_album(pending);

    let mut executor = BatchExecutor::new(BatchPreset::Progress);
    if let Some(token) = cancel.clone() {
        executor = executor.with_cancel(token);
    }

    let outcome = executor
        .run(groups, |group| {
            let source = Arc::clone(&source);
            async move { save_group(pool, store, source, group).await }
        })
        .await;

    let mut report = SaveReport::default();
    for result in &outcome.results {
        match result {
            Ok((checked, saved)) => {
                report.checked += checked;
                report.saved += usize::from(*saved);
            }
            Err(e) => {
                tracing::warn!(target: "artwork", error = %e, "Artwork group failed");
                report.failed += 1;
            }
        }
    }

    if outcome.was_cancelled() {
        return Err(Error::Cancelled);
    }

    // Siblings of a track that just supplied album art are now covered.
    tracks::mark_covered_tracks_checked(pool).await?;

    Ok(report)
}

fn group_by_album(pending: Vec<ArtCandidate>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for track in pending {
        match (track.album_id, groups.last_mut()) {
            (Some(id), Some(last)) if last.album_id == Some(id) => last.tracks.push(track),
            (album_id, _) => groups.push(Group {
                album_id,
                tracks: vec![track],
            }),
        }
    }
    groups
}

/// Try a group's tracks in order until one has artwork.
///
/// Returns the number of tracks checked and whether a file was saved.
async fn save_group(
    pool: &SqlitePool,
    store: &ArtworkStore,
    source: Arc<dyn MetadataSource>,
    group: Group,
) -> Result<(usize, bool)> {
    let mut checked = 0;

    for track in group.tracks {
        tracks::set_fetched_art(pool, track.id).await?;
        checked += 1;

        let Some(path) = uri::to_path(&track.uri).map(PathBuf::from) else {
            continue;
        };
        let reader = Arc::clone(&source);
        let bytes = match tokio::task::spawn_blocking(move || reader.artwork(&path)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(target: "artwork", uri = %track.uri, error = %e, "Artwork reader panicked");
                continue;
            }
        };

        let saved = match store.save(bytes).await {
            Ok(saved) => saved,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!(target: "artwork", uri = %track.uri, error = %e, "Unusable artwork");
                continue;
            }
        };

        match group.album_id {
            Some(album_id) => albums::set_album_artwork(pool, album_id, &saved).await?,
            None => tracks::set_embedded_artwork(pool, track.id, &saved).await?,
        }
        tracing::trace!(target: "artwork", uri = %track.uri, path = %saved, "Saved artwork");
        return Ok((checked, true));
    }

    Ok((checked, false))
}
