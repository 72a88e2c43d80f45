//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `scan`: rescans and catalog maintenance (repair, artwork GC)
//! - `browse`: folder listing and the invalid file report
//! - `playlist`: M3U import

mod browse;
mod playlist;
mod scan;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::db;
use crate::indexer::Indexer;

pub use browse::{cmd_errors, cmd_folder};
pub use playlist::cmd_import;
pub use scan::{cmd_gc, cmd_repair, cmd_rescan};

/// Music library indexer
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog database path (overrides the config file)
    #[arg(long, global = true, env = "MUSIC_INDEXER_DB")]
    pub db: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Crawl the library and bring the catalog up to date
    Rescan {
        /// Re-read every file, even unchanged ones
        #[arg(long)]
        deep: bool,
    },
    /// List a folder (top-level folders when PATH is omitted)
    Folder {
        /// Folder path such as `Music/Rock`
        path: Option<String>,
    },
    /// List files that could not be indexed
    Errors,
    /// Resolve an M3U playlist against the catalog
    Import {
        /// Playlist file path or `file://` URI
        file: String,
        /// Store the playlist in the catalog
        #[arg(long)]
        save: bool,
    },
    /// Delete saved artwork no longer referenced by the catalog
    Gc,
    /// Merge duplicate unknown-year albums
    Repair,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let ctx = rt.block_on(Context::open(cli))?;

    match &cli.command {
        Commands::Rescan { deep } => cmd_rescan(&rt, &ctx, *deep),
        Commands::Folder { path } => cmd_folder(&rt, &ctx, path.as_deref()),
        Commands::Errors => cmd_errors(&rt, &ctx),
        Commands::Import { file, save } => cmd_import(&rt, &ctx, file, *save),
        Commands::Gc => cmd_gc(&rt, &ctx),
        Commands::Repair => cmd_repair(&rt, &ctx),
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// State shared by every command: the opened catalog and output mode.
pub struct Context {
    pub indexer: Indexer,
    pub json: bool,
}

impl Context {
    async fn open(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => config::load_from(path),
            None => config::load(),
        };
        if let Some(db) = &cli.db {
            config.storage.database = Some(db.clone());
        }

        let db_path = config.storage.database_path();
        ensure_parent(&db_path)?;
        let pool = db::init_db(&db::db_url(Some(&db_path)))
            .await
            .with_context(|| format!("opening catalog {}", db_path.display()))?;
        tracing::debug!(target: "cli", db = %db_path.display(), "Catalog opened");

        Ok(Self {
            indexer: Indexer::new(pool, &config),
            json: cli.json,
        })
    }

    /// Print `value` as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}
