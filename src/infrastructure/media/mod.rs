//! Local media tooling.

mod ffmpeg;

pub use ffmpeg::{DEFAULT_SEEK_SECONDS, FfmpegFrameExtractor};
