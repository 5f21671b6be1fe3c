//! Attachment DTOs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entities::{LoadedThumbnail, MessageAttachment};

/// Outcome of loading a message attachment.
#[derive(Debug, Clone)]
pub enum LoadedAttachment {
    /// A decoded preview of an image or video.
    Thumbnail(LoadedThumbnail),
    /// A cached file.
    File(PathBuf),
}

impl LoadedAttachment {
    /// Local path of the loaded attachment.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Thumbnail(thumbnail) => &thumbnail.path,
            Self::File(path) => path,
        }
    }
}

/// One entry of a batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    /// The attachment to load.
    #[serde(flatten)]
    pub attachment: MessageAttachment,
    /// Load the full file instead of a preview.
    #[serde(default)]
    pub full: bool,
}
