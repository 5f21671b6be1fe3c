//! Storage roots backed by local directories.

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::domain::ports::{FallbackLayout, StorageRootProvider};

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
const APP_NAME: &str = "attachment-cache";

/// Storage roots resolved from configured or platform directories.
#[derive(Debug, Clone)]
pub struct DirectoryRoots {
    primary: Option<PathBuf>,
    fallback: PathBuf,
    layout: FallbackLayout,
}

impl DirectoryRoots {
    /// Creates roots from explicit directories.
    #[must_use]
    pub const fn new(primary: Option<PathBuf>, fallback: PathBuf, layout: FallbackLayout) -> Self {
        Self {
            primary,
            fallback,
            layout,
        }
    }

    /// Roots in the platform data directory (primary) and cache directory
    /// (fallback), overridable per root.
    #[must_use]
    pub fn platform(
        primary_override: Option<PathBuf>,
        fallback_override: Option<PathBuf>,
        layout: FallbackLayout,
    ) -> Self {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME);
        let primary = primary_override.or_else(|| {
            dirs.as_ref()
                .map(|dirs| dirs.data_dir().join("attachments"))
        });
        let fallback = fallback_override.unwrap_or_else(|| {
            dirs.as_ref().map_or_else(
                || std::env::temp_dir().join(APP_NAME).join("files"),
                |dirs| dirs.cache_dir().join("files"),
            )
        });
        Self::new(primary, fallback, layout)
    }
}

impl StorageRootProvider for DirectoryRoots {
    fn primary(&self) -> Option<PathBuf> {
        let root = self.primary.as_ref()?;
        if root.is_dir() {
            return Some(root.clone());
        }
        match std::fs::create_dir_all(root) {
            Ok(()) => {
                debug!(path = %root.display(), "Created primary storage root");
                Some(root.clone())
            }
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Primary storage root unavailable");
                None
            }
        }
    }

    fn fallback(&self) -> PathBuf {
        self.fallback.clone()
    }

    fn fallback_layout(&self) -> FallbackLayout {
        self.layout
    }
}
