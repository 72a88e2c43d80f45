//! Folder hierarchy materializer and folder browsing.
//!
//! The tree is derived from track URIs alone: every directory holding a
//! track, and each of its ancestors up to a storage root, gets a
//! [`FileNode`]. Nodes left without tracks are pruned afterwards.
//!
//! A file under a configured root hangs off a single node for the whole
//! root (`storage/emulated/0/`), so volume paths don't produce a chain of
//! uninteresting ancestors. Other files start their chain at the first
//! path segment.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::batch::BatchPreset;
use crate::db::{file_nodes, tracks};
use crate::error::Result;
use crate::model::{FileNode, Track};
use crate::uri;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderReport {
    /// Nodes implied by current tracks
    pub nodes: usize,
    /// Rows inserted or corrected
    pub written: u64,
    /// Rows deleted
    pub pruned: u64,
}

/// One level of the folder browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderContents {
    pub sub_directories: Vec<FileNode>,
    pub tracks: Vec<Track>,
}

/// Rebuild the folder tree from the catalog.
pub async fn materialize(pool: &SqlitePool, roots: &[PathBuf]) -> Result<FolderReport> {
    let uris = tracks::get_all_uris(pool).await?;
    let root_folders: Vec<String> = roots.iter().filter_map(|r| root_folder(r)).collect();
    let nodes = derive_nodes(&uris, &root_folders);

    let mut report = FolderReport {
        nodes: nodes.len(),
        ..FolderReport::default()
    };
    // Nodes are sorted by path, so every window holds parents before children.
    for window in nodes.chunks(BatchPreset::Light.limit()) {
        report.written += file_nodes::upsert_file_nodes(pool, window).await?;
    }
    report.pruned = file_nodes::prune_file_nodes(pool).await?;

    tracing::debug!(target: "folders", ?report, "Folder tree materialized");
    Ok(report)
}

/// Folder-path form of a storage root (`storage/emulated/0/`).
fn root_folder(root: &std::path::Path) -> Option<String> {
    let as_uri = uri::from_path(&root.join("_"));
    uri::parent_folder(&as_uri)
}

/// Every node implied by `uris`, sorted by path.
pub fn derive_nodes(uris: &[String], root_folders: &[String]) -> Vec<FileNode> {
    let mut nodes: BTreeMap<String, FileNode> = BTreeMap::new();

    for uri in uris {
        let Some(folder) = uri::parent_folder(uri) else {
            continue;
        };
        if nodes.contains_key(&folder) {
            continue;
        }

        // Longest matching root wins for nested roots.
        let root = root_folders
            .iter()
            .filter(|root| folder.starts_with(root.as_str()))
            .max_by_key(|root| root.len());

        let (mut parent, rest) = match root {
            Some(root) => {
                nodes.entry(root.clone()).or_insert_with(|| FileNode {
                    path: root.clone(),
                    parent_path: None,
                    name: last_segment(root),
                });
                (Some(root.clone()), &folder[root.len()..])
            }
            None => (None, folder.as_str()),
        };

        let mut path = parent.clone().unwrap_or_default();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            path.push_str(segment);
            path.push('/');
            nodes.entry(path.clone()).or_insert_with(|| FileNode {
                path: path.clone(),
                parent_path: parent.clone(),
                name: segment.to_string(),
            });
            parent = Some(path.clone());
        }
    }

    nodes.into_values().collect()
}

fn last_segment(folder: &str) -> String {
    folder
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(folder)
        .to_string()
}

/// List one folder.
///
/// `None`, `""` or `"/"` is the pseudo-root: top-level folders only, never
/// tracks. Otherwise `path` is a folder path such as `Music/Rock`, with or
/// without the trailing slash. Tracks are the folder's direct children.
pub async fn get_folder(pool: &SqlitePool, path: Option<&str>) -> Result<FolderContents> {
    let folder = path.map(|p| p.trim_start_matches('/')).unwrap_or_default();
    if folder.is_empty() {
        return Ok(FolderContents {
            sub_directories: file_nodes::get_subdirectories(pool, None).await?,
            tracks: Vec::new(),
        });
    }

    let folder = uri::with_trailing_slash(folder);
    Ok(FolderContents {
        sub_directories: file_nodes::get_subdirectories(pool, Some(&folder)).await?,
        tracks: tracks::get_folder_tracks(pool, &uri::folder_prefix(&folder)).await?,
    })
}
