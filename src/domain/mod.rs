//! Domain layer with attachment entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{AttachmentCategory, AttachmentRef, DecodeTarget, LocalCacheEntry};
pub use errors::{DecodeStage, FetchError, FetchResult};
