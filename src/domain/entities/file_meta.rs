//! Remote attachment descriptors exchanged with the server.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::AttachmentRef;

/// Remote descriptor of an uploaded attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Server-side key of the blob.
    #[serde(default)]
    pub blob_key: String,
    /// Declared file name.
    #[serde(default)]
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub content_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Thumbnail URL, when the server produced one.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Direct download URL, when provided.
    #[serde(default)]
    pub url: Option<String>,
    /// Upload time reported by the server.
    #[serde(default)]
    pub created_at_time: Option<i64>,
}

/// An attachment as carried by a message, routed by the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachment {
    /// Key of the owning message.
    pub message_key: String,
    /// Creation time of the owning message.
    pub created_at_epoch_ms: i64,
    /// Remote descriptor.
    pub file_meta: FileMeta,
    /// Local copy of a video, when the message was sent from this device.
    #[serde(default)]
    pub local_video_path: Option<PathBuf>,
}

impl MessageAttachment {
    /// Builds an [`AttachmentRef`] pointing at `remote_url`.
    #[must_use]
    pub fn attachment_ref(&self, remote_url: impl Into<String>) -> AttachmentRef {
        AttachmentRef::new(
            self.message_key.clone(),
            remote_url,
            self.file_meta.content_type.clone(),
            self.file_meta.name.clone(),
            self.created_at_epoch_ms,
        )
    }
}

/// Where a returned thumbnail came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailSource {
    /// Already present in the local cache.
    DiskCache,
    /// Downloaded during this call.
    Network,
    /// Extracted locally from a video during this call.
    Generated,
}

/// A decoded thumbnail together with its cache location.
#[derive(Debug, Clone)]
pub struct LoadedThumbnail {
    /// Cache path of the thumbnail.
    pub path: PathBuf,
    /// The decoded image.
    pub image: Arc<image::DynamicImage>,
    /// Where the image came from.
    pub source: ThumbnailSource,
}
