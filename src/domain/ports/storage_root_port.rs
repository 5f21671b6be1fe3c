//! Port supplying writable storage roots.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directory layout used when only the fallback root is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackLayout {
    /// Every category lands in a single `image` directory. Thumbnails keep
    /// their `.Thumbnail` subdirectory so they never replace full files.
    #[default]
    Collapsed,
    /// The fallback root keeps the per-category layout.
    Categorized,
}

/// Supplies the primary and fallback storage roots.
pub trait StorageRootProvider: Send + Sync {
    /// Preferred root, or `None` when it is currently unavailable.
    fn primary(&self) -> Option<PathBuf>;

    /// Private root that is always available.
    fn fallback(&self) -> PathBuf;

    /// Layout applied under the fallback root.
    fn fallback_layout(&self) -> FallbackLayout {
        FallbackLayout::Collapsed
    }
}
