//! Attachment descriptors and cache naming.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Content type used by contact cards.
pub const CONTACT_CARD_CONTENT_TYPE: &str = "text/x-vcard";

/// Extension used for every video thumbnail, downloaded or generated.
pub const VIDEO_THUMBNAIL_EXTENSION: &str = "jpeg";

/// Extension used when a content type carries no usable subtype.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Storage category an attachment is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentCategory {
    /// `image/*` content.
    Image,
    /// `video/*` content.
    Video,
    /// vCard contact cards.
    Contact,
    /// Everything else.
    Other,
}

impl AttachmentCategory {
    /// Classifies a content type.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.trim();
        if content_type.starts_with("image") {
            Self::Image
        } else if content_type.starts_with("video") {
            Self::Video
        } else if content_type.eq_ignore_ascii_case(CONTACT_CARD_CONTENT_TYPE) {
            Self::Contact
        } else {
            Self::Other
        }
    }

    /// Directory name under the storage root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Contact => "contact",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AttachmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Reference to a remote attachment, scoped to one fetch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// Key of the owning message, used as the attachment id in the message store.
    pub message_key: String,
    /// URL the bytes are fetched from.
    pub remote_url: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Declared attachment name, usually including an extension.
    pub display_name: String,
    /// Creation time of the owning message.
    pub created_at_epoch_ms: i64,
    /// Whether the thumbnail rendition is requested.
    #[serde(default)]
    pub is_thumbnail_request: bool,
}

impl AttachmentRef {
    /// Creates a reference for the full attachment.
    #[must_use]
    pub fn new(
        message_key: impl Into<String>,
        remote_url: impl Into<String>,
        content_type: impl Into<String>,
        display_name: impl Into<String>,
        created_at_epoch_ms: i64,
    ) -> Self {
        Self {
            message_key: message_key.into(),
            remote_url: remote_url.into(),
            content_type: content_type.into(),
            display_name: display_name.into(),
            created_at_epoch_ms,
            is_thumbnail_request: false,
        }
    }

    /// Marks this reference as a thumbnail request.
    #[must_use]
    pub fn thumbnail(mut self) -> Self {
        self.is_thumbnail_request = true;
        self
    }

    /// Category derived from the content type.
    #[must_use]
    pub fn category(&self) -> AttachmentCategory {
        AttachmentCategory::from_content_type(&self.content_type)
    }

    /// Deterministic cache file name:
    /// `{declared name stem}{created at}.{extension}`.
    ///
    /// Video thumbnails always use [`VIDEO_THUMBNAIL_EXTENSION`] so that
    /// downloaded and locally generated thumbnails share a key.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        self.cache_file_name_for(self.is_thumbnail_request)
    }

    /// Cache file name of the thumbnail (`true`) or full (`false`)
    /// rendition, regardless of what this reference requests.
    #[must_use]
    pub fn cache_file_name_for(&self, thumbnail: bool) -> String {
        let extension = if thumbnail && self.category() == AttachmentCategory::Video {
            VIDEO_THUMBNAIL_EXTENSION.to_string()
        } else {
            extension_for(&self.content_type)
                .or_else(|| declared_extension(&self.display_name))
                .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
        };
        format!(
            "{}{}.{}",
            name_stem(&self.display_name),
            self.created_at_epoch_ms,
            extension
        )
    }
}

/// Location of an attachment in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalCacheEntry {
    /// Absolute path of the cached file.
    pub absolute_path: PathBuf,
    /// Category directory the file lives in.
    pub category: AttachmentCategory,
    /// Whether the file is a thumbnail rendition.
    pub is_thumbnail: bool,
}

impl LocalCacheEntry {
    /// Returns true when the cached file is present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.absolute_path.is_file()
    }

    /// Returns the cached file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }
}

/// Conventional file extension for a content type.
///
/// Parameters are ignored, vCards map to `vcf`, structured syntax suffixes
/// (`svg+xml`) are dropped. Returns `None` when no subtype is present.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(CONTACT_CARD_CONTENT_TYPE)
        || essence.eq_ignore_ascii_case("text/vcard")
    {
        return Some("vcf".to_string());
    }

    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.split('+').next().unwrap_or_default().trim();
    if subtype.is_empty() {
        None
    } else {
        Some(subtype.to_ascii_lowercase())
    }
}

/// Declared name without its final extension.
#[must_use]
pub fn name_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn declared_extension(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}
