//! Port for recording where attachments were cached.

use std::path::Path;

use crate::domain::errors::FetchResult;

/// Message store collaborator notified after successful fetches.
#[cfg_attr(test, mockall::automock)]
pub trait MessageStore: Send + Sync {
    /// Records the local path of an attachment.
    ///
    /// # Errors
    /// Returns error if the store cannot be updated.
    fn update_local_path(&self, attachment_id: &str, path: &Path) -> FetchResult<()>;
}
