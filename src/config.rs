//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-indexer\config.toml
//! - macOS: ~/Library/Application Support/music-indexer/config.toml
//! - Linux: ~/.config/music-indexer/config.toml
//!
//! The config file is human-readable and editable. Missing sections and
//! fields fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the OS config/data directories.
const APP_DIR: &str = "music-indexer";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to index
    pub library: LibraryConfig,

    /// Where the catalog and artwork live
    pub storage: StorageConfig,
}

/// Library discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Storage roots to crawl when `allow_list` is empty
    pub roots: Vec<PathBuf>,

    /// Only index files under these directories (overrides `roots`)
    pub allow_list: Vec<PathBuf>,

    /// Never index files under these directories, even if allow-listed
    pub block_list: Vec<PathBuf>,

    /// Files shorter than this (seconds) are ignored
    pub min_duration_secs: u64,

    /// Audio file extensions, lowercase, without the dot
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            allow_list: Vec::new(),
            block_list: Vec::new(),
            min_duration_secs: 15,
            extensions: ["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl LibraryConfig {
    /// Storage roots used when nothing is configured: the user's audio
    /// directory, or `~/Music`.
    pub fn default_roots() -> Vec<PathBuf> {
        dirs::audio_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
            .into_iter()
            .collect()
    }

    /// Configured roots, or [`Self::default_roots`] when none are set.
    pub fn effective_roots(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            Self::default_roots()
        } else {
            self.roots.clone()
        }
    }
}

/// Catalog storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file (default: `<data dir>/music-indexer/library.db`)
    pub database: Option<PathBuf>,

    /// Saved artwork directory (default: `<data dir>/music-indexer/artwork`)
    pub artwork_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| data_dir().join(crate::db::DEFAULT_DB_NAME))
    }

    pub fn artwork_path(&self) -> PathBuf {
        self.artwork_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("artwork"))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Directory for the catalog database and artwork.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Load configuration from the default location.
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific file.
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location.
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to a specific file, atomically (temp file + rename).
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        crate::error::Error::config(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[storage]"));
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.library.allow_list.push(PathBuf::from("/music"));
        config.library.block_list.push(PathBuf::from("/music/podcasts"));
        config.library.min_duration_secs = 30;
        config.storage.artwork_dir = Some(PathBuf::from("/tmp/art"));

        save_to(&config, &path).unwrap();
        let parsed = load_from(&path);

        assert_eq!(parsed.library.allow_list, vec![PathBuf::from("/music")]);
        assert_eq!(parsed.library.min_duration_secs, 30);
        assert_eq!(parsed.storage.artwork_path(), PathBuf::from("/tmp/art"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[library]
block_list = ["/sdcard/Recordings"]
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.library.block_list,
            vec![PathBuf::from("/sdcard/Recordings")]
        );
        assert_eq!(config.library.min_duration_secs, 15);
        assert!(config.library.extensions.contains(&"flac".to_string()));
        assert!(config.storage.database.is_none());
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "library = [not toml").unwrap();

        let config = load_from(&path);
        assert_eq!(config.library.min_duration_secs, 15);
    }

    #[test]
    fn test_effective_roots_prefers_configured() {
        let config = LibraryConfig {
            roots: vec![PathBuf::from("/storage/emulated/0")],
            ..LibraryConfig::default()
        };
        assert_eq!(
            config.effective_roots(),
            vec![PathBuf::from("/storage/emulated/0")]
        );
    }
}
