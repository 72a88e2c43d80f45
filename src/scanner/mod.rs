//! File system crawler.
//!
//! Walks the configured roots and yields every audio file as a
//! [`Candidate`]. When the allow-list is non-empty it replaces the roots;
//! block-listed directories are never entered, even when they sit inside an
//! allow-listed one.
//!
//! The walk runs on a blocking thread and feeds a bounded channel, so the
//! returned stream is lazy and memory stays flat however large the library
//! is. Unreadable directories are logged and skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use futures::stream::Stream;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::uri;

/// A discovered audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Catalog URI (`file:///...`)
    pub uri: String,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time, unix seconds (`-1` if unknown)
    pub modified: i64,
}

/// What to crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub roots: Vec<PathBuf>,
    pub allow_list: Vec<PathBuf>,
    pub block_list: Vec<PathBuf>,
    /// Lowercase extensions without the dot
    pub extensions: Vec<String>,
}

impl CrawlOptions {
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self {
            roots: config.effective_roots(),
            allow_list: config.allow_list.clone(),
            block_list: config.block_list.clone(),
            extensions: config.extensions.clone(),
        }
    }

    /// Directories the walk starts from.
    pub fn search_roots(&self) -> &[PathBuf] {
        if self.allow_list.is_empty() {
            &self.roots
        } else {
            &self.allow_list
        }
    }

    /// Block-listed paths win over allow-listed ones.
    pub fn is_blocked(&self, path: &Path) -> bool {
        self.block_list.iter().any(|blocked| path.starts_with(blocked))
    }

    pub fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// Make sure the roots can be crawled at all.
///
/// A root that exists but can't be listed (permission denied) is an
/// infrastructure failure. Missing roots are skipped with a warning, since
/// removable storage comes and goes.
pub async fn check_roots(roots: &[PathBuf]) -> Result<()> {
    for root in roots {
        if !tokio::fs::try_exists(root).await.unwrap_or(false) {
            tracing::warn!(target: "scanner", root = %root.display(), "Root does not exist, skipping");
            continue;
        }
        if let Err(e) = tokio::fs::read_dir(root).await {
            tracing::error!(target: "scanner", root = %root.display(), error = %e, "Root is not readable");
            return Err(Error::infrastructure(root, e));
        }
    }
    Ok(())
}

/// Crawl the configured roots for audio files.
///
/// Returns a stream of [`Candidate`]s. Dropping the stream stops the walk.
pub fn crawl(options: CrawlOptions) -> impl Stream<Item = Candidate> {
    let (tx, rx) = mpsc::channel(256);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        let mut seen = HashSet::new();

        for root in options.search_roots() {
            if options.is_blocked(root) {
                tracing::debug!(target: "scanner", root = %root.display(), "Root is block-listed");
                continue;
            }

            let walker = WalkDir::new(root)
                .into_iter()
                .filter_entry(|entry| !options.is_blocked(entry.path()));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(target: "scanner", error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !options.is_audio_file(entry.path()) {
                    continue;
                }
                // Overlapping roots would otherwise yield a file twice.
                if !seen.insert(entry.path().to_path_buf()) {
                    continue;
                }

                let metadata = entry.metadata().ok();
                let candidate = Candidate {
                    uri: uri::from_path(entry.path()),
                    path: entry.path().to_path_buf(),
                    size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                    modified: metadata
                        .and_then(|m| m.modified().ok())
                        .map(unix_seconds)
                        .unwrap_or(-1),
                };

                // If the receiver is dropped, stop scanning.
                if tx.blocking_send(candidate).is_err() {
                    return;
                }
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|candidate| (candidate, rx))
    })
}

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(-1)
}
