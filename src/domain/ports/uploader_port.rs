//! Port for uploading local attachments.

use std::path::Path;

use crate::domain::entities::FileMeta;
use crate::domain::errors::FetchResult;

/// Uploads a local file and returns its remote descriptor.
#[cfg_attr(test, mockall::automock)]
pub trait Uploader: Send + Sync {
    /// Uploads the file at `path`, declared as `content_type`.
    ///
    /// # Errors
    /// Returns `NotFound` if the file is missing, `Upload` if the server
    /// rejects it or answers with an unreadable descriptor.
    fn upload(&self, path: &Path, content_type: &str) -> FetchResult<FileMeta>;
}
