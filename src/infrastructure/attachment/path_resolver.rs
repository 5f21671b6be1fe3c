//! Deterministic cache path construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::domain::entities::{AttachmentCategory, AttachmentRef, LocalCacheEntry};
use crate::domain::ports::{FallbackLayout, StorageRootProvider};

/// Subdirectory holding thumbnails under a category directory.
pub const THUMBNAIL_DIR: &str = ".Thumbnail";

/// Maps attachments to local cache paths.
///
/// The mapping is a pure function of its inputs and the storage roots; the
/// only side effect is idempotent directory creation.
#[derive(Clone)]
pub struct PathResolver {
    roots: Arc<dyn StorageRootProvider>,
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver").finish_non_exhaustive()
    }
}

impl PathResolver {
    /// Creates a resolver over the given roots.
    #[must_use]
    pub fn new(roots: Arc<dyn StorageRootProvider>) -> Self {
        Self { roots }
    }

    /// Resolves the cache path of `file_name` for a content type.
    ///
    /// Missing directories are created. A creation failure is only logged;
    /// it surfaces as an I/O error when the file is written.
    #[must_use]
    pub fn resolve(&self, content_type: &str, file_name: &str, is_thumbnail: bool) -> PathBuf {
        let entry = self.entry(content_type, file_name, is_thumbnail);
        entry.absolute_path
    }

    /// Resolves the full cache entry of `file_name` for a content type.
    #[must_use]
    pub fn entry(
        &self,
        content_type: &str,
        file_name: &str,
        is_thumbnail: bool,
    ) -> LocalCacheEntry {
        let category = AttachmentCategory::from_content_type(content_type);
        let dir = self.directory_for(category, is_thumbnail);
        ensure_dir(&dir);
        let absolute_path = dir.join(sanitize_file_name(file_name));
        trace!(path = %absolute_path.display(), %category, is_thumbnail, "Resolved cache path");
        LocalCacheEntry {
            absolute_path,
            category,
            is_thumbnail,
        }
    }

    /// Resolves the thumbnail entry of an attachment.
    #[must_use]
    pub fn thumbnail_entry(&self, attachment: &AttachmentRef) -> LocalCacheEntry {
        self.rendition_entry(attachment, true)
    }

    /// Resolves the full-attachment entry of an attachment.
    #[must_use]
    pub fn attachment_entry(&self, attachment: &AttachmentRef) -> LocalCacheEntry {
        self.rendition_entry(attachment, false)
    }

    fn rendition_entry(&self, attachment: &AttachmentRef, thumbnail: bool) -> LocalCacheEntry {
        self.entry(
            &attachment.content_type,
            &attachment.cache_file_name_for(thumbnail),
            thumbnail,
        )
    }

    /// Directory a category is stored in, without touching the filesystem.
    ///
    /// The collapsed fallback layout folds every category into `image` but
    /// keeps thumbnails in their own subdirectory, next to the files they
    /// were generated from.
    #[must_use]
    pub fn directory_for(&self, category: AttachmentCategory, is_thumbnail: bool) -> PathBuf {
        if let Some(root) = self.roots.primary() {
            return category_dir(&root, category, is_thumbnail);
        }

        let fallback = self.roots.fallback();
        match self.roots.fallback_layout() {
            FallbackLayout::Collapsed => {
                category_dir(&fallback, AttachmentCategory::Image, is_thumbnail)
            }
            FallbackLayout::Categorized => category_dir(&fallback, category, is_thumbnail),
        }
    }
}

/// Thumbnail directory next to a cached file.
#[must_use]
pub fn thumbnail_dir_of(file: &Path) -> PathBuf {
    file.parent()
        .unwrap_or_else(|| Path::new(""))
        .join(THUMBNAIL_DIR)
}

/// Creates `dir` and its parents, logging instead of failing.
pub(crate) fn ensure_dir(dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(path = %dir.display(), error = %e, "Failed to create cache directory");
    }
}

fn category_dir(root: &Path, category: AttachmentCategory, is_thumbnail: bool) -> PathBuf {
    let dir = root.join(category.dir_name());
    if is_thumbnail {
        dir.join(THUMBNAIL_DIR)
    } else {
        dir
    }
}

/// Reduces a declared name to a single path component.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
