//! Audio file metadata extraction.
//!
//! Uses the lofty crate for format-independent tag access. Reading goes
//! through the [`MetadataSource`] trait so the indexing pipeline can be
//! driven by a fake source in tests.
//!
//! [`extract`] turns one crawled [`Candidate`] into an [`ExtractOutcome`]:
//! failures never escape as errors, they become
//! [`ExtractOutcome::Failed`] and are recorded as invalid tracks later.

use std::path::Path;
use std::sync::Arc;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};

use crate::error::{Error, Result};
use crate::model::UNKNOWN_ARTIST;
use crate::scanner::Candidate;

/// Raw tag values read from a file. Absent or blank tags are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<i64>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    /// Duration in seconds
    pub duration: u64,
}

/// Where tags and artwork come from.
///
/// Implementations are called from blocking threads.
pub trait MetadataSource: Send + Sync {
    /// Read the tags of an audio file.
    fn read(&self, path: &Path) -> Result<TrackMetadata>;

    /// Raw bytes of the file's cover image, if it has one.
    fn artwork(&self, path: &Path) -> Option<Vec<u8>>;
}

/// [`MetadataSource`] backed by lofty, with sidecar image fallback for
/// artwork.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftySource;

impl MetadataSource for LoftySource {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        read(path)
    }

    fn artwork(&self, path: &Path) -> Option<Vec<u8>> {
        crate::artwork::extract::find_artwork(path)
    }
}

/// Read tags and duration with lofty.
pub fn read(path: &Path) -> Result<TrackMetadata> {
    // Probe the file to determine format and read tags
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let text = |value: Option<std::borrow::Cow<'_, str>>| value.and_then(|s| clean(&s));

    Ok(TrackMetadata {
        title: tag.and_then(|t| text(t.title())),
        artist: tag.and_then(|t| text(t.artist())),
        album: tag.and_then(|t| text(t.album())),
        album_artist: tag
            .and_then(|t| t.get_string(&ItemKey::AlbumArtist))
            .and_then(clean),
        year: tag.and_then(|t| t.year()).map(i64::from),
        track_number: tag.and_then(|t| t.track()),
        disc_number: tag.and_then(|t| t.disk()),
        duration: tagged_file.properties().duration().as_secs(),
    })
}

/// Trimmed value, or `None` when blank.
fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Album identity as extracted from tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumKey {
    pub name: String,
    pub artist_name: String,
}

/// Catalog-ready fields for one successfully read file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTrack {
    pub uri: String,
    pub modified: i64,
    pub name: String,
    pub artist_name: String,
    pub album: Option<AlbumKey>,
    pub year: Option<i64>,
    pub track: Option<i64>,
    pub disc: Option<i64>,
    pub duration: i64,
}

impl ExtractedTrack {
    /// Apply fallbacks to raw tags: title falls back to the file name
    /// without extension, artist to [`UNKNOWN_ARTIST`], album artist to the
    /// track artist.
    pub fn from_metadata(candidate: &Candidate, meta: TrackMetadata) -> Self {
        let artist_name = meta.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let album = meta.album.map(|name| AlbumKey {
            name,
            artist_name: meta.album_artist.unwrap_or_else(|| artist_name.clone()),
        });
        let name = meta.title.unwrap_or_else(|| {
            candidate
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| candidate.uri.clone())
        });

        Self {
            uri: candidate.uri.clone(),
            modified: candidate.modified,
            name,
            artist_name,
            album,
            year: meta.year,
            track: meta.track_number.map(i64::from),
            disc: meta.disc_number.map(i64::from),
            duration: meta.duration as i64,
        }
    }
}

/// A file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractFailure {
    pub uri: String,
    pub modified: i64,
    pub error_name: String,
    pub message: String,
}

/// Result of extracting one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted(ExtractedTrack),
    /// Shorter than the minimum duration; dropped silently.
    TooShort { uri: String },
    Failed(ExtractFailure),
}

impl ExtractOutcome {
    pub fn uri(&self) -> &str {
        match self {
            Self::Extracted(track) => &track.uri,
            Self::TooShort { uri } => uri,
            Self::Failed(failure) => &failure.uri,
        }
    }
}

/// Extract one candidate on a blocking thread.
///
/// Never fails: read errors and panics inside the source become
/// [`ExtractOutcome::Failed`].
pub async fn extract(
    source: Arc<dyn MetadataSource>,
    candidate: Candidate,
    min_duration_secs: u64,
) -> ExtractOutcome {
    let path = candidate.path.clone();
    let read = tokio::task::spawn_blocking(move || source.read(&path)).await;

    let failure = |error_name: &str, message: String| {
        tracing::debug!(target: "metadata", uri = %candidate.uri, %message, "Extraction failed");
        ExtractOutcome::Failed(ExtractFailure {
            uri: candidate.uri.clone(),
            modified: candidate.modified,
            error_name: error_name.to_string(),
            message,
        })
    };

    match read {
        Ok(Ok(meta)) if meta.duration < min_duration_secs => ExtractOutcome::TooShort {
            uri: candidate.uri,
        },
        Ok(Ok(meta)) => ExtractOutcome::Extracted(ExtractedTrack::from_metadata(&candidate, meta)),
        Ok(Err(e)) => failure(e.kind(), e.to_string()),
        Err(join) => failure("ReaderPanic", join.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeSource, mock_candidate};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write");

        let result = read(file.path());
        assert!(matches!(result, Err(Error::Metadata { .. })));
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        assert!(read(Path::new("non_existent_file.mp3")).is_err());
    }

    #[test]
    fn test_fallbacks_for_missing_tags() {
        let candidate = mock_candidate("/Music/Some Song.mp3");
        let track = ExtractedTrack::from_metadata(
            &candidate,
            TrackMetadata {
                duration: 200,
                ..TrackMetadata::default()
            },
        );

        assert_eq!(track.name, "Some Song");
        assert_eq!(track.artist_name, UNKNOWN_ARTIST);
        assert_eq!(track.album, None);
        assert_eq!(track.duration, 200);
    }

    #[test]
    fn test_album_artist_falls_back_to_artist() {
        let candidate = mock_candidate("/Music/a.mp3");
        let track = ExtractedTrack::from_metadata(
            &candidate,
            TrackMetadata {
                artist: Some("Queen".into()),
                album: Some("Jazz".into()),
                ..TrackMetadata::default()
            },
        );
        assert_eq!(
            track.album,
            Some(AlbumKey {
                name: "Jazz".into(),
                artist_name: "Queen".into()
            })
        );
    }

    #[test]
    fn test_clean_trims_and_drops_blank() {
        assert_eq!(clean("  Abbey Road "), Some("Abbey Road".to_string()));
        assert_eq!(clean("   "), None);
    }

    #[tokio::test]
    async fn test_extract_outcomes() {
        let source = Arc::new(
            FakeSource::new()
                .with_track("/m/long.mp3", "Long", "A", None, 300)
                .with_track("/m/short.mp3", "Short", "A", None, 5)
                .with_failure("/m/broken.mp3", "corrupt frame header"),
        );

        let long = extract(source.clone(), mock_candidate("/m/long.mp3"), 30).await;
        assert!(matches!(long, ExtractOutcome::Extracted(ref t) if t.name == "Long"));

        let short = extract(source.clone(), mock_candidate("/m/short.mp3"), 30).await;
        assert_eq!(short, ExtractOutcome::TooShort { uri: "file:///m/short.mp3".into() });

        let broken = extract(source, mock_candidate("/m/broken.mp3"), 30).await;
        match broken {
            ExtractOutcome::Failed(failure) => {
                assert_eq!(failure.uri, "file:///m/broken.mp3");
                assert!(failure.message.contains("corrupt frame header"));
                assert_eq!(failure.error_name, "MetadataError");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
