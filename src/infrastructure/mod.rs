//! Infrastructure layer with external service adapters.

/// Attachment cache, decode pipeline, and downloads.
pub mod attachment;
/// Application configuration.
pub mod config;
/// HTTP transport, uploads, and server URLs.
pub mod http;
/// Video frame extraction.
pub mod media;
/// Storage roots and message store.
pub mod storage;

pub use attachment::{AttachmentFetcher, PathResolver, ReplayableStream, VideoThumbnailGenerator};
pub use config::{AppConfig, CliArgs, Command, ConfigFile, LogLevel};
pub use http::{HttpUploader, ReqwestTransport, ServerUrlResolver};
pub use media::FfmpegFrameExtractor;
pub use storage::{DirectoryRoots, JsonMessageStore};
