//! Music Indexer - builds and maintains the catalog of a local music library.
//!
//! See `music-indexer --help` for commands.

use clap::Parser;
use music_indexer::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so `--json` output on stdout stays clean.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("music_indexer=info".parse()?))
        .init();

    cli::run_command(&args)
}
