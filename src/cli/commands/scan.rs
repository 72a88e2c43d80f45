//! Rescan and catalog maintenance commands.

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::Context;
use crate::batch::CancelToken;
use crate::db;
use crate::indexer::{Phase, RescanOptions, RescanSummary, ScanProgress};

/// Crawl the library and update the catalog.
///
/// Ctrl+C cancels between batch windows; committed work stays.
pub fn cmd_rescan(rt: &Runtime, ctx: &Context, deep: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let cancel = CancelToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let options = RescanOptions {
            deep,
            progress: Some(tx),
            cancel: Some(cancel.clone()),
        };

        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(target: "cli", "Interrupted, stopping after the current batch");
                ctrl_c.cancel();
            }
        });

        let quiet = ctx.json;
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !quiet {
                    print_progress(&event);
                }
            }
        });

        let indexer = ctx.indexer.clone();
        let result = indexer.rescan(options).await;
        // The sender is dropped with `options`, which ends the printer.
        let _ = printer.await;
        let summary = result?;

        if ctx.json {
            ctx.print_json(&summary)?;
        } else {
            print_summary(&summary);
            let counts = db::catalog_counts(ctx.indexer.pool()).await?;
            println!(
                "Catalog: {} tracks, {} albums, {} artists, {} folders, {} invalid files",
                counts.tracks, counts.albums, counts.artists, counts.file_nodes, counts.invalid_tracks
            );
        }
        Ok(())
    })
}

fn print_progress(event: &ScanProgress) {
    match event {
        ScanProgress::Phase(phase) => eprintln!("{}", phase_label(*phase)),
        ScanProgress::Discovered(count) => eprintln!("  found {count} audio files"),
        ScanProgress::Extracted { done, total } => eprintln!("  read {done}/{total}"),
        ScanProgress::Saved { staged, errors } => {
            eprintln!("  saved {staged} ({errors} errors)")
        }
        ScanProgress::Finished(_) => {}
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Crawling => "Crawling library...",
        Phase::Extracting => "Reading tags...",
        Phase::Synchronizing => "Updating catalog...",
        Phase::Repairing => "Repairing albums...",
        Phase::SavingArtwork => "Saving artwork...",
        Phase::CollectingGarbage => "Cleaning up artwork...",
        Phase::BuildingFolders => "Building folders...",
    }
}

fn print_summary(summary: &RescanSummary) {
    println!("\nRescan complete in {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    println!("  Found:      {}", summary.found);
    println!("  Read:       {}", summary.extracted);
    println!("  Unchanged:  {}", summary.skipped_unchanged);
    println!("  Too short:  {}", summary.too_short);
    println!("  Errors:     {}", summary.errors);
    println!("  Removed:    {}", summary.removed);
    println!("  Artwork:    {} saved, {} deleted", summary.artwork_saved, summary.artwork_deleted);
    if summary.albums_merged > 0 {
        println!("  Albums merged: {}", summary.albums_merged);
    }
}

/// Delete saved artwork nothing references.
pub fn cmd_gc(rt: &Runtime, ctx: &Context) -> anyhow::Result<()> {
    rt.block_on(async {
        let report = ctx.indexer.collect_garbage().await?;
        info!(target: "cli", deleted = report.deleted, "Artwork garbage collected");
        if ctx.json {
            ctx.print_json(&report)?;
        } else {
            println!(
                "Artwork: {} kept, {} deleted, {} failed",
                report.kept, report.deleted, report.failed
            );
        }
        Ok(())
    })
}

/// Merge duplicate unknown-year albums.
pub fn cmd_repair(rt: &Runtime, ctx: &Context) -> anyhow::Result<()> {
    rt.block_on(async {
        let report = ctx.indexer.repair().await?;
        if ctx.json {
            ctx.print_json(&report)?;
        } else {
            println!(
                "Merged {} duplicate albums in {} groups ({} tracks moved, {} groups failed)",
                report.merged, report.groups, report.tracks_moved, report.failed_groups
            );
            if report.normalized > 0 {
                println!("Normalized {} unknown release years", report.normalized);
            }
        }
        Ok(())
    })
}
