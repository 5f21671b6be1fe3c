//! Attachment cache: path resolution, replayable decoding, and downloads.

mod atomic_file;
mod decode_pipeline;
mod fetcher;
mod path_resolver;
mod replay_stream;
mod video_thumbnail;

pub use atomic_file::{PARTIAL_PREFIX, copy_to_file, save_image, write_atomically, write_unique};
pub use decode_pipeline::{
    DecodedImage, PROBE_CHUNK, decode_bounds_then_sampled, decode_sampled, decode_with_mark_limit,
    load_cached, read_dimensions,
};
pub use fetcher::{
    AttachmentFetcher, DEFAULT_THUMBNAIL_QUALITY, PROFILE_IMAGE_BOUNDS, PROFILE_MARK_LIMIT,
    generic_file_name,
};
pub use path_resolver::{PathResolver, THUMBNAIL_DIR, thumbnail_dir_of};
pub use replay_stream::{MarkToken, ReplayableStream, UNBOUNDED};
pub use video_thumbnail::{DEFAULT_JPEG_QUALITY, VideoThumbnailGenerator};

#[cfg(test)]
pub(crate) use decode_pipeline::fixtures;
