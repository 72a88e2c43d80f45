//! Library indexing and synchronization engine for a local music player.
//!
//! [`indexer::Indexer`] is the entry point: a rescan crawls the configured
//! storage roots, reads tags, and brings the SQLite catalog in line with
//! what is on disk. Album repair, artwork saving and garbage collection,
//! and the folder tree run as later stages of the same pass.

pub mod artwork;
pub mod batch;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod folders;
pub mod indexer;
pub mod metadata;
pub mod model;
pub mod playlist;
pub mod repair;
pub mod scanner;
pub mod sync;
#[cfg(test)]
pub mod test_utils;
pub mod uri;
