//! Data transfer objects for the application layer.

mod attachment_dto;

pub use attachment_dto::{BatchEntry, LoadedAttachment};
