//! Domain entities.

mod attachment;
mod decode_target;
mod file_meta;

pub use attachment::{
    AttachmentCategory, AttachmentRef, CONTACT_CARD_CONTENT_TYPE, FALLBACK_EXTENSION,
    LocalCacheEntry, VIDEO_THUMBNAIL_EXTENSION, extension_for, name_stem,
};
pub use decode_target::DecodeTarget;
pub use file_meta::{FileMeta, LoadedThumbnail, MessageAttachment, ThumbnailSource};
