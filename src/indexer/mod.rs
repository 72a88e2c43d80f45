//! Library indexing service.
//!
//! [`Indexer`] owns the catalog pool and runs the full pipeline on request:
//!
//! ```text
//! crawl -> extract -> synchronize -> repair -> save artwork -> GC -> folders
//! ```
//!
//! Only one rescan runs at a time; a second request while one is active is
//! rejected with [`Error::RescanInProgress`]. Progress is reported on an
//! optional channel and cancellation is honored between batch windows and
//! between stages. Work committed before a cancellation stays valid.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use tokio::sync::mpsc::UnboundedSender;

use crate::artwork::{self, ArtworkStore};
use crate::batch::{BatchExecutor, BatchPreset, CancelToken};
use crate::config::{Config, LibraryConfig};
use crate::db::{invalid_tracks, tracks};
use crate::error::{Error, Result};
use crate::folders::{self, FolderContents};
use crate::metadata::{self, ExtractOutcome, LoftySource, MetadataSource};
use crate::model::InvalidTrack;
use crate::playlist::{self, ImportedPlaylist};
use crate::repair;
use crate::scanner::{self, Candidate, CrawlOptions};
use crate::sync;

/// Pipeline stage, reported as it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Crawling,
    Extracting,
    Synchronizing,
    Repairing,
    SavingArtwork,
    CollectingGarbage,
    BuildingFolders,
}

/// Progress events sent during a rescan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScanProgress {
    Phase(Phase),
    /// Audio files found by the crawler
    Discovered(usize),
    /// Files read so far out of those needing extraction
    Extracted { done: usize, total: usize },
    /// Running totals of catalog writes
    Saved { staged: usize, errors: usize },
    Finished(RescanSummary),
}

/// Result of a rescan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescanSummary {
    /// Audio files found, minus those too short to index
    pub found: usize,
    pub extracted: usize,
    pub skipped_unchanged: usize,
    pub too_short: usize,
    /// Files that failed extraction or could not be written
    pub errors: usize,
    pub removed: usize,
    pub artwork_saved: usize,
    pub artwork_deleted: usize,
    pub albums_merged: usize,
    pub elapsed_ms: u64,
}

/// Per-call rescan settings.
#[derive(Debug, Clone, Default)]
pub struct RescanOptions {
    /// Re-extract every file, even when its modification time is unchanged
    pub deep: bool,
    pub progress: Option<UnboundedSender<ScanProgress>>,
    pub cancel: Option<CancelToken>,
}

impl RescanOptions {
    pub fn deep(deep: bool) -> Self {
        Self {
            deep,
            ..Self::default()
        }
    }
}

/// Clears the in-progress flag when a rescan ends, however it ends.
struct RescanGuard(Arc<AtomicBool>);

impl RescanGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::RescanInProgress)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for RescanGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The indexing engine.
#[derive(Clone)]
pub struct Indexer {
    pool: SqlitePool,
    library: LibraryConfig,
    artwork: ArtworkStore,
    source: Arc<dyn MetadataSource>,
    in_progress: Arc<AtomicBool>,
}

impl Indexer {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self {
            pool,
            library: config.library.clone(),
            artwork: ArtworkStore::new(config.storage.artwork_path()),
            source: Arc::new(LoftySource),
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read tags and artwork from `source` instead of lofty.
    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.source = source;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn artwork_store(&self) -> &ArtworkStore {
        &self.artwork
    }

    pub fn is_rescanning(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run the full indexing pipeline.
    ///
    /// Per-file failures are counted in the summary, never returned. Errors
    /// are returned for storage that can't be read at all, cancellation, a
    /// concurrent rescan, and catalog failures outside per-file work.
    pub async fn rescan(&self, options: RescanOptions) -> Result<RescanSummary> {
        let _guard = RescanGuard::acquire(&self.in_progress)?;
        let started = Instant::now();
        tracing::info!(target: "indexer", deep = options.deep, "Rescan started");

        let result = self.run_pipeline(&options).await;

        match &result {
            Ok(summary) => {
                tracing::info!(
                    target: "indexer",
                    found = summary.found,
                    errors = summary.errors,
                    removed = summary.removed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Rescan complete"
                );
                emit(&options, ScanProgress::Finished(summary.clone()));
            }
            Err(Error::Cancelled) => tracing::info!(target: "indexer", "Rescan cancelled"),
            Err(e) => tracing::error!(target: "indexer", error = %e, "Rescan failed"),
        }
        result
    }

    async fn run_pipeline(&self, options: &RescanOptions) -> Result<RescanSummary> {
        let started = Instant::now();
        let cancel = options.cancel.clone();
        let check_cancel = || {
            if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                Err(Error::Cancelled)
            } else {
                Ok(())
            }
        };
        let mut summary = RescanSummary::default();

        // Crawl
        emit(options, ScanProgress::Phase(Phase::Crawling));
        let stage = Instant::now();
        let crawl = CrawlOptions::from_config(&self.library);
        let search_roots: Vec<PathBuf> = crawl.search_roots().to_vec();
        scanner::check_roots(&search_roots).await?;
        let candidates: Vec<Candidate> = scanner::crawl(crawl).collect().await;
        emit(options, ScanProgress::Discovered(candidates.len()));
        log_stage("crawl", stage, candidates.len());
        check_cancel()?;

        // Extract
        emit(options, ScanProgress::Phase(Phase::Extracting));
        let stage = Instant::now();
        let mut found: HashSet<String> = candidates.iter().map(|c| c.uri.clone()).collect();
        let pending = self.changed_candidates(candidates, options.deep).await?;
        summary.skipped_unchanged = found.len() - pending.len();
        let outcomes = self.extract_all(pending, options).await?;
        for outcome in &outcomes {
            match outcome {
                ExtractOutcome::Extracted(_) => summary.extracted += 1,
                ExtractOutcome::TooShort { uri } => {
                    summary.too_short += 1;
                    found.remove(uri);
                }
                ExtractOutcome::Failed(_) => {}
            }
        }
        summary.found = found.len();
        log_stage("extract", stage, outcomes.len());
        check_cancel()?;

        // Synchronize
        emit(options, ScanProgress::Phase(Phase::Synchronizing));
        let stage = Instant::now();
        let synced = sync::synchronize(&self.pool, outcomes, &found, cancel.clone(), |staged, errors| {
            emit(options, ScanProgress::Saved { staged, errors });
        })
        .await?;
        summary.errors = synced.errors;
        summary.removed = synced.removed;
        log_stage("sync", stage, synced.staged);
        check_cancel()?;

        // Repair
        emit(options, ScanProgress::Phase(Phase::Repairing));
        let stage = Instant::now();
        let repaired = repair::repair_albums(&self.pool).await?;
        summary.albums_merged = repaired.merged;
        log_stage("repair", stage, repaired.merged);
        check_cancel()?;

        // Artwork
        emit(options, ScanProgress::Phase(Phase::SavingArtwork));
        let stage = Instant::now();
        let saved =
            artwork::save_artwork(&self.pool, &self.artwork, Arc::clone(&self.source), cancel.clone())
                .await?;
        summary.artwork_saved = saved.saved;
        log_stage("artwork", stage, saved.saved);
        check_cancel()?;

        emit(options, ScanProgress::Phase(Phase::CollectingGarbage));
        let stage = Instant::now();
        let collected = artwork::collect_garbage(&self.pool, &self.artwork).await?;
        summary.artwork_deleted = collected.deleted;
        log_stage("gc", stage, collected.deleted);
        check_cancel()?;

        // Folders
        emit(options, ScanProgress::Phase(Phase::BuildingFolders));
        let stage = Instant::now();
        let folders = folders::materialize(&self.pool, &search_roots).await?;
        log_stage("folders", stage, folders.nodes);

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Candidates whose file changed since it was last indexed.
    ///
    /// Files without a track row (new, or previously invalid) always count
    /// as changed, as does everything on a deep rescan.
    async fn changed_candidates(
        &self,
        candidates: Vec<Candidate>,
        deep: bool,
    ) -> Result<Vec<Candidate>> {
        if deep {
            return Ok(candidates);
        }
        let known = tracks::get_track_mtimes(&self.pool).await?;
        Ok(candidates
            .into_iter()
            .filter(|c| c.modified < 0 || known.get(&c.uri) != Some(&c.modified))
            .collect())
    }

    async fn extract_all(
        &self,
        pending: Vec<Candidate>,
        options: &RescanOptions,
    ) -> Result<Vec<ExtractOutcome>> {
        let mut executor = BatchExecutor::new(BatchPreset::Heavy);
        if let Some(token) = options.cancel.clone() {
            executor = executor.with_cancel(token);
        }
        let min_duration = self.library.min_duration_secs;

        let outcome = executor
            .run_with_progress(
                pending,
                |candidate| {
                    let source = Arc::clone(&self.source);
                    async move {
                        Ok::<_, std::convert::Infallible>(
                            metadata::extract(source, candidate, min_duration).await,
                        )
                    }
                },
                |window| {
                    emit(
                        options,
                        ScanProgress::Extracted {
                            done: window.processed,
                            total: window.total,
                        },
                    )
                },
            )
            .await;

        if outcome.was_cancelled() {
            return Err(Error::Cancelled);
        }
        let (outcomes, _) = outcome.partition();
        Ok(outcomes)
    }

    /// Browse one folder level. See [`folders::get_folder`].
    pub async fn get_folder(&self, path: Option<&str>) -> Result<FolderContents> {
        folders::get_folder(&self.pool, path).await
    }

    /// Files that could not be indexed, with their errors.
    pub async fn get_save_errors(&self) -> Result<Vec<InvalidTrack>> {
        Ok(invalid_tracks::get_invalid_tracks(&self.pool).await?)
    }

    /// Resolve an M3U playlist file against the catalog.
    pub async fn import_m3u(&self, file: &str) -> Result<ImportedPlaylist> {
        playlist::import_m3u(&self.pool, file).await
    }

    /// Run album repair on its own.
    pub async fn repair(&self) -> Result<repair::RepairReport> {
        let _guard = RescanGuard::acquire(&self.in_progress)?;
        repair::repair_albums(&self.pool).await
    }

    /// Run artwork garbage collection on its own.
    pub async fn collect_garbage(&self) -> Result<artwork::GcReport> {
        let _guard = RescanGuard::acquire(&self.in_progress)?;
        artwork::collect_garbage(&self.pool, &self.artwork).await
    }
}

fn emit(options: &RescanOptions, event: ScanProgress) {
    if let Some(tx) = &options.progress {
        // A dropped receiver just means nobody is listening.
        let _ = tx.send(event);
    }
}

fn log_stage(stage: &'static str, started: Instant, count: usize) {
    tracing::info!(
        target: "indexer",
        stage,
        count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Stage finished"
    );
}
