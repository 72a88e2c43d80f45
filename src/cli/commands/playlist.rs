//! Playlist import command.

use tokio::runtime::Runtime;

use super::Context;
use crate::db::playlists;

/// Resolve an M3U file and optionally store it as a playlist.
pub fn cmd_import(rt: &Runtime, ctx: &Context, file: &str, save: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let playlist = ctx.indexer.import_m3u(file).await?;

        if save {
            let ids: Vec<i64> = playlist.tracks.iter().map(|t| t.id).collect();
            playlists::create_playlist(ctx.indexer.pool(), &playlist.name, &ids).await?;
            tracing::info!(target: "cli", name = %playlist.name, tracks = ids.len(), "Playlist saved");
        }

        if ctx.json {
            return ctx.print_json(&playlist);
        }

        println!(
            "{} ({} tracks, {:?} paths)",
            playlist.name,
            playlist.tracks.len(),
            playlist.strategy
        );
        for (i, track) in playlist.tracks.iter().enumerate() {
            println!("{:>4}. {}", i + 1, track.uri);
        }
        if save {
            println!("Saved as playlist \"{}\"", playlist.name);
        }
        Ok(())
    })
}
