//! Local thumbnail generation for videos without a server thumbnail.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::entities::{
    DecodeTarget, LoadedThumbnail, ThumbnailSource, VIDEO_THUMBNAIL_EXTENSION,
};
use crate::domain::errors::{DecodeStage, FetchError, FetchResult};
use crate::domain::ports::FrameExtractor;

use super::atomic_file::save_image;
use super::decode_pipeline::load_cached;
use super::path_resolver::{ensure_dir, thumbnail_dir_of};

/// JPEG quality of generated thumbnails.
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Extracts a still from a local video and caches it beside the video.
#[derive(Clone)]
pub struct VideoThumbnailGenerator {
    extractor: Arc<dyn FrameExtractor>,
    jpeg_quality: u8,
}

impl std::fmt::Debug for VideoThumbnailGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoThumbnailGenerator")
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl VideoThumbnailGenerator {
    /// Creates a generator with the default JPEG quality.
    #[must_use]
    pub fn new(extractor: Arc<dyn FrameExtractor>) -> Self {
        Self {
            extractor,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Overrides the JPEG quality, clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Thumbnail path of a video: `<video dir>/.Thumbnail/<stem>.jpeg`.
    ///
    /// Server-downloaded and generated thumbnails share this path.
    ///
    /// # Errors
    /// Returns `NotFound` if `video` has no file name.
    pub fn thumbnail_path(video: &Path) -> FetchResult<PathBuf> {
        let stem = video
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FetchError::NotFound(format!("no file name in {}", video.display())))?;
        Ok(thumbnail_dir_of(video).join(format!(
            "{}.{VIDEO_THUMBNAIL_EXTENSION}",
            stem.to_string_lossy()
        )))
    }

    /// Returns the thumbnail of `video` already on disk, whichever way it
    /// got there. An unreadable file counts as absent.
    ///
    /// # Errors
    /// Returns `NotFound` if `video` has no file name.
    pub fn cached(video: &Path) -> FetchResult<Option<LoadedThumbnail>> {
        let path = Self::thumbnail_path(video)?;
        let Some(cached) = load_cached(&path, DecodeTarget::original()) else {
            return Ok(None);
        };
        debug!(path = %path.display(), "Video thumbnail cache hit");
        Ok(Some(LoadedThumbnail {
            path,
            image: Arc::new(cached.image),
            source: ThumbnailSource::DiskCache,
        }))
    }

    /// Extracts a frame from `video` and persists it at its thumbnail path.
    ///
    /// # Errors
    /// Returns `NotFound` if the video is missing, `Decode` with stage
    /// `FrameExtraction` if no frame can be produced, or `Io` if the
    /// thumbnail cannot be written. Nothing is left on disk on failure.
    pub fn extract_frame(&self, video: &Path) -> FetchResult<LoadedThumbnail> {
        if !video.is_file() {
            return Err(FetchError::NotFound(video.display().to_string()));
        }
        let path = Self::thumbnail_path(video)?;
        if let Some(dir) = path.parent() {
            ensure_dir(dir);
        }

        let frame = self
            .extractor
            .extract_frame(video)
            .map_err(|cause| FetchError::decode(DecodeStage::FrameExtraction, cause))?;
        save_image(&path, &frame, self.jpeg_quality)?;

        info!(
            video = %video.display(),
            path = %path.display(),
            width = frame.width(),
            height = frame.height(),
            "Generated video thumbnail"
        );
        Ok(LoadedThumbnail {
            path,
            image: Arc::new(frame),
            source: ThumbnailSource::Generated,
        })
    }
}
