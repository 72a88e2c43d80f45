//! Artwork storage.
//!
//! Cover images found in audio files are re-encoded to JPEG and written to
//! the artwork directory under a random id (`<24 alphanumerics>.jpg`).
//! Catalog rows reference them by full path.
//!
//! - [`extract`] - Embedded and sidecar cover lookup
//! - [`save`] - The post-sync pass that attaches artwork to albums/tracks
//! - [`gc`] - Deletes files no catalog row references

pub mod extract;
pub mod gc;
pub mod save;

pub use gc::{GcReport, collect_garbage};
pub use save::{SaveReport, save_artwork};

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use rand::Rng;

use crate::error::{Error, Result};

/// JPEG quality used for stored artwork.
const JPEG_QUALITY: u8 = 85;

/// Length of the random file id.
const ID_LEN: usize = 24;

/// Directory of saved artwork files.
#[derive(Debug, Clone)]
pub struct ArtworkStore {
    dir: PathBuf,
}

impl ArtworkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode `bytes`, re-encode as JPEG and store under a fresh id.
    ///
    /// Runs on a blocking thread. Returns the stored file's path as it is
    /// referenced from the catalog.
    pub async fn save(&self, bytes: Vec<u8>) -> Result<String> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || write_jpeg(&dir, &bytes))
            .await
            .map_err(|e| Error::artwork(format!("encoder task failed: {e}")))?
    }
}

fn write_jpeg(dir: &Path, bytes: &[u8]) -> Result<String> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::artwork(format!("failed to decode image: {e}")))?;

    let mut encoded = Vec::new();
    image
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY))
        .map_err(|e| Error::artwork(format!("failed to encode JPEG: {e}")))?;

    std::fs::create_dir_all(dir).map_err(|e| Error::infrastructure(dir, e))?;
    let path = dir.join(format!("{}.jpg", random_id()));
    std::fs::write(&path, &encoded)?;

    Ok(path.to_string_lossy().into_owned())
}

/// Collision-resistant random file id.
fn random_id() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
