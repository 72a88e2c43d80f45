//! Folder browsing and the invalid file report.

use tokio::runtime::Runtime;

use super::Context;
use crate::model::Track;

/// List one folder level.
pub fn cmd_folder(rt: &Runtime, ctx: &Context, path: Option<&str>) -> anyhow::Result<()> {
    rt.block_on(async {
        let contents = ctx.indexer.get_folder(path).await?;
        if ctx.json {
            return ctx.print_json(&contents);
        }

        if contents.sub_directories.is_empty() && contents.tracks.is_empty() {
            println!("(empty)");
            return Ok(());
        }
        for dir in &contents.sub_directories {
            println!("{}/", dir.name);
        }
        for track in &contents.tracks {
            println!("{}", track_line(track));
        }
        Ok(())
    })
}

fn track_line(track: &Track) -> String {
    let artist = track.artist_name.as_deref().unwrap_or("");
    let minutes = track.duration / 60;
    let seconds = track.duration % 60;
    if artist.is_empty() {
        format!("{} [{minutes}:{seconds:02}]", track.name)
    } else {
        format!("{} - {} [{minutes}:{seconds:02}]", artist, track.name)
    }
}

/// Print every file that failed to index.
pub fn cmd_errors(rt: &Runtime, ctx: &Context) -> anyhow::Result<()> {
    rt.block_on(async {
        let invalid = ctx.indexer.get_save_errors().await?;
        if ctx.json {
            return ctx.print_json(&invalid);
        }

        if invalid.is_empty() {
            println!("No indexing errors.");
            return Ok(());
        }
        for entry in &invalid {
            let kind = entry.error_name.as_deref().unwrap_or("Error");
            println!("{}\n  {kind}: {}", entry.uri, entry.error_message);
        }
        println!("\n{} files could not be indexed", invalid.len());
        Ok(())
    })
}
