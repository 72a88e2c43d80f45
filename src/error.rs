//! Library-wide error types.
//!
//! Library modules return [`Result`] built on the [`Error`] enum, while the
//! CLI entry point uses `anyhow` for convenient error propagation.
//!
//! # Taxonomy
//!
//! - Per-file extraction/write failures never surface here during a pass;
//!   they are recorded as invalid tracks (see [`crate::sync`]).
//! - [`Error::Infrastructure`] aborts the current pass (permission denied,
//!   storage unavailable).
//! - [`Error::Import`] is a user-facing playlist import failure.
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::error::{Error, Result, ResultExt};
//!
//! fn load(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_context("reading playlist")
//! }
//! ```

use std::path::PathBuf;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Metadata reading error
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Artwork decoding/encoding error
    #[error("Artwork error: {0}")]
    Artwork(String),

    /// Storage cannot be accessed at all; fatal to the current pass.
    #[error("Storage unavailable at {path}: {source}")]
    Infrastructure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rescan was requested while another one is running.
    #[error("A library rescan is already in progress")]
    RescanInProgress,

    /// The pass was cancelled between batch windows.
    #[error("Operation cancelled")]
    Cancelled,

    /// Playlist import failure
    #[error("Playlist import failed: {0}")]
    Import(#[from] crate::playlist::ImportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an infrastructure error for a storage location.
    pub fn infrastructure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Infrastructure {
            path: path.into(),
            source,
        }
    }

    /// Create an artwork error.
    pub fn artwork(message: impl Into<String>) -> Self {
        Self::Artwork(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error must abort a whole pass rather than a single item.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Infrastructure { .. } | Self::Cancelled | Self::RescanInProgress => true,
            Self::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Short machine-friendly name, stored alongside invalid tracks.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "IoError",
            Self::Database(_) => "DatabaseError",
            Self::Metadata { .. } => "MetadataError",
            Self::Artwork(_) => "ArtworkError",
            Self::Infrastructure { .. } => "InfrastructureError",
            Self::RescanInProgress => "RescanInProgress",
            Self::Cancelled => "Cancelled",
            Self::Import(_) => "ImportError",
            Self::Config(_) => "ConfigError",
            Self::WithContext { source, .. } => source.kind(),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
