//! Find cover art for an audio file.
//!
//! Embedded tag pictures win (ID3v2, Vorbis comments, MP4 atoms); otherwise
//! a sidecar image in the same directory is used. Common sidecar names:
//! cover, folder, album, front, artwork, albumart.

use std::path::{Path, PathBuf};

use lofty::file::TaggedFileExt;
use lofty::picture::PictureType;
use lofty::probe::Probe;

/// Common cover art filenames (lowercase for matching)
const COVER_FILENAMES: &[&str] = &[
    "cover",
    "folder",
    "album",
    "front",
    "artwork",
    "albumart",
    "albumartsmall",
];

/// Supported image extensions
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Raw image bytes for `audio_path`, embedded first, then sidecar.
pub fn find_artwork(audio_path: &Path) -> Option<Vec<u8>> {
    embedded_cover(audio_path).or_else(|| {
        let sidecar = find_sidecar(audio_path)?;
        std::fs::read(sidecar).ok()
    })
}

/// Front cover from the file's tags, falling back to the first picture.
///
/// Returns None if nothing is embedded or the file can't be read.
pub fn embedded_cover(path: &Path) -> Option<Vec<u8>> {
    let tagged_file = Probe::open(path).ok()?.read().ok()?;

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())?;

    let pictures = tag.pictures();
    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())?;

    Some(picture.data().to_vec())
}

/// Sidecar cover image next to the audio file.
pub fn find_sidecar(audio_path: &Path) -> Option<PathBuf> {
    let parent = audio_path.parent()?;

    // Exact lowercase names first, in priority order.
    for name in COVER_FILENAMES {
        for ext in IMAGE_EXTENSIONS {
            let cover_path = parent.join(format!("{name}.{ext}"));
            if cover_path.is_file() {
                return Some(cover_path);
            }
        }
    }

    // Case variations on case-sensitive filesystems
    std::fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| path.is_file())
        .find(|path| {
            let lower = |s: Option<&std::ffi::OsStr>| {
                s.and_then(|s| s.to_str()).map(|s| s.to_lowercase())
            };
            match (lower(path.file_stem()), lower(path.extension())) {
                (Some(stem), Some(ext)) => {
                    COVER_FILENAMES.contains(&stem.as_str())
                        && IMAGE_EXTENSIONS.contains(&ext.as_str())
                }
                _ => false,
            }
        })
}
