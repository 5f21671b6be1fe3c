//! Port for extracting still frames from local videos.

use std::path::Path;

/// External media-decoding capability.
pub trait FrameExtractor: Send + Sync {
    /// Extracts one representative still from the video at `video`.
    ///
    /// # Errors
    /// Returns a description of the failure if no frame can be produced.
    fn extract_frame(&self, video: &Path) -> Result<image::DynamicImage, String>;
}
