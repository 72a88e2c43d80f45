//! Artwork garbage collection.
//!
//! Deletes every file in the artwork directory that no track, album,
//! artist or playlist row references. Must run after synchronization and
//! repair, once references have settled.

use std::path::PathBuf;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::ArtworkStore;
use crate::batch::{BatchExecutor, BatchPreset};
use crate::db;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Remove unreferenced artwork files.
///
/// A missing artwork directory means there is nothing to collect. A
/// directory that can't be listed is an infrastructure failure.
pub async fn collect_garbage(pool: &SqlitePool, store: &ArtworkStore) -> Result<GcReport> {
    let referenced = db::artwork::get_referenced_artwork(pool).await?;

    let mut entries = match tokio::fs::read_dir(store.dir()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GcReport::default()),
        Err(e) => return Err(Error::infrastructure(store.dir(), e)),
    };

    let mut orphans: Vec<PathBuf> = Vec::new();
    let mut kept = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let full = path.to_string_lossy();
        let name = entry.file_name();
        if referenced.contains(&*full) || referenced.contains(&*name.to_string_lossy()) {
            kept += 1;
        } else {
            orphans.push(path);
        }
    }

    let outcome = BatchExecutor::new(BatchPreset::Moderate)
        .run(orphans, |path| async move {
            tokio::fs::remove_file(&path).await.map_err(|e| (path, e))
        })
        .await;

    let (deleted, failed) = outcome.partition();
    for (path, e) in &failed {
        tracing::warn!(target: "artwork", path = %path.display(), error = %e, "Failed to delete orphaned artwork");
    }

    let report = GcReport {
        kept,
        deleted: deleted.len(),
        failed: failed.len(),
    };
    tracing::debug!(target: "artwork", ?report, "Artwork garbage collected");
    Ok(report)
}
