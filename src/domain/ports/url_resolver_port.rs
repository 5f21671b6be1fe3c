//! Port mapping attachment descriptors to server URLs.

use crate::domain::entities::FileMeta;

/// Resolves the URLs an attachment is fetched from or uploaded to.
#[cfg_attr(test, mockall::automock)]
pub trait UrlResolver: Send + Sync {
    /// Thumbnail URL, or `None` if the server has no thumbnail.
    fn thumbnail_url(&self, meta: &FileMeta) -> Option<String>;

    /// Full-file download URL.
    fn download_url(&self, meta: &FileMeta) -> Option<String>;

    /// Upload endpoint.
    fn upload_url(&self) -> String;
}
