//! Attachment upload use case.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::entities::{AttachmentCategory, FileMeta};
use crate::domain::errors::FetchResult;
use crate::domain::ports::Uploader;
use crate::infrastructure::attachment::AttachmentFetcher;

/// Uploads local attachments.
pub struct UploadAttachmentUseCase {
    uploader: Arc<dyn Uploader>,
    fetcher: AttachmentFetcher,
}

impl UploadAttachmentUseCase {
    /// Creates new use case.
    #[must_use]
    pub const fn new(uploader: Arc<dyn Uploader>, fetcher: AttachmentFetcher) -> Self {
        Self { uploader, fetcher }
    }

    /// Uploads the file at `path` and returns its remote descriptor.
    ///
    /// When the server returns no thumbnail for a video, one is generated
    /// next to the local file so the sender's preview never needs a
    /// download. Generation failures are logged and do not fail the upload.
    ///
    /// # Errors
    /// Returns the uploader's error.
    pub fn execute(&self, path: &Path, content_type: &str) -> FetchResult<FileMeta> {
        let meta = self.uploader.upload(path, content_type)?;
        info!(path = %path.display(), blob_key = %meta.blob_key, "Attachment uploaded");

        if AttachmentCategory::from_content_type(content_type) == AttachmentCategory::Video
            && meta.thumbnail_url.is_none()
        {
            if let Err(e) = self.fetcher.fetch_or_generate_video_thumbnail(path, None) {
                warn!(path = %path.display(), error = %e, "Failed to generate video thumbnail");
            }
        }
        Ok(meta)
    }
}
