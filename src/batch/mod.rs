//! Bounded batch executor.
//!
//! Runs an async operation over many independent items without putting them
//! all in flight at once. Items are processed in fixed-size windows; a window
//! is awaited to completion before the next one starts, so memory and open
//! file handles stay bounded by the window size.
//!
//! Each item yields its own `Result`: one failing item never affects its
//! siblings. After every window an optional callback receives that window's
//! successes and failures, which drives progress reporting.
//!
//! Cancellation is checked between windows only. A window that has started
//! always runs to completion.
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::batch::{BatchExecutor, BatchPreset};
//!
//! let outcome = BatchExecutor::new(BatchPreset::Heavy)
//!     .run(paths, |path| async move { read_tags(path).await })
//!     .await;
//! println!("{} ok, {} failed", outcome.succeeded(), outcome.failed());
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;

/// Window sizes for common workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPreset {
    /// Cheap work such as single-row writes
    Light,
    /// Mixed I/O such as deleting files
    Moderate,
    /// File reads plus parsing
    Heavy,
    /// Small windows so progress updates stay frequent
    Progress,
    /// One item at a time
    Serial,
}

impl BatchPreset {
    /// Number of items in flight per window.
    pub const fn limit(self) -> usize {
        match self {
            Self::Light => 500,
            Self::Moderate => 200,
            Self::Heavy => 100,
            Self::Progress => 25,
            Self::Serial => 1,
        }
    }
}

/// Shared cancellation flag, checked between batch windows.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next window boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of one completed window, handed to the window callback.
#[derive(Debug)]
pub struct WindowReport<'a, T, E> {
    /// Zero-based window number
    pub index: usize,
    /// Items processed so far, this window included
    pub processed: usize,
    /// Total number of items submitted
    pub total: usize,
    pub fulfilled: Vec<&'a T>,
    pub rejected: Vec<&'a E>,
}

/// Outcome of a batch run, one result per processed item in input order.
#[derive(Debug)]
pub struct BatchOutcome<T, E> {
    pub results: Vec<Result<T, E>>,
    /// Items never started because cancellation was requested
    pub skipped: usize,
}

impl<T, E> BatchOutcome<T, E> {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
    }

    /// Split into successes and failures.
    pub fn partition(self) -> (Vec<T>, Vec<E>) {
        let mut ok = Vec::new();
        let mut err = Vec::new();
        for result in self.results {
            match result {
                Ok(value) => ok.push(value),
                Err(e) => err.push(e),
            }
        }
        (ok, err)
    }
}

/// Concurrency-limited task runner.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    limit: usize,
    cancel: Option<CancelToken>,
}

impl BatchExecutor {
    pub fn new(preset: BatchPreset) -> Self {
        Self::with_limit(preset.limit())
    }

    /// Custom window size. A limit of zero is treated as one.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Process every item, without a window callback.
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, op: F) -> BatchOutcome<T, E>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_progress(items, op, |_| {}).await
    }

    /// Process every item, calling `on_window` after each window completes.
    pub async fn run_with_progress<I, T, E, F, Fut, C>(
        &self,
        items: Vec<I>,
        mut op: F,
        mut on_window: C,
    ) -> BatchOutcome<T, E>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(WindowReport<'_, T, E>),
    {
        let total = items.len();
        let mut results: Vec<Result<T, E>> = Vec::with_capacity(total);
        let mut remaining = items.into_iter();
        let mut index = 0;

        while results.len() < total {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                tracing::debug!(
                    target: "batch",
                    processed = results.len(),
                    total,
                    "Cancelled between windows"
                );
                break;
            }

            let window: Vec<Fut> = remaining.by_ref().take(self.limit).map(&mut op).collect();
            let start = results.len();
            results.extend(join_all(window).await);

            let (mut fulfilled, mut rejected) = (Vec::new(), Vec::new());
            for result in &results[start..] {
                match result {
                    Ok(value) => fulfilled.push(value),
                    Err(e) => rejected.push(e),
                }
            }
            on_window(WindowReport {
                index,
                processed: results.len(),
                total,
                fulfilled,
                rejected,
            });
            index += 1;
        }

        let skipped = total - results.len();
        BatchOutcome { results, skipped }
    }
}
