//! Attachment download orchestration.
//!
//! Every fetch follows the same shape: compute the deterministic cache path,
//! return the cached file when present, otherwise open exactly one
//! connection and publish the result through a temp-then-rename write.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::domain::entities::{
    AttachmentCategory, AttachmentRef, DecodeTarget, FALLBACK_EXTENSION, LoadedThumbnail,
    ThumbnailSource, extension_for,
};
use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::{HttpResponse, HttpTransport, MessageStore};

use super::atomic_file::{copy_to_file, save_image, write_unique};
use super::decode_pipeline::{decode_bounds_then_sampled, decode_with_mark_limit, load_cached};
use super::path_resolver::PathResolver;
use super::replay_stream::ReplayableStream;
use super::video_thumbnail::VideoThumbnailGenerator;

/// Bounds profile images are decoded at.
pub const PROFILE_IMAGE_BOUNDS: DecodeTarget = DecodeTarget::new(100, 50);

/// Bytes buffered while probing a profile image header.
pub const PROFILE_MARK_LIMIT: usize = 1024;

/// JPEG quality of persisted image thumbnails.
pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 85;

const IMPORT_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Downloads attachments into the local cache.
#[derive(Clone)]
pub struct AttachmentFetcher {
    resolver: PathResolver,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn MessageStore>,
    videos: VideoThumbnailGenerator,
    jpeg_quality: u8,
}

impl std::fmt::Debug for AttachmentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentFetcher")
            .field("resolver", &self.resolver)
            .field("videos", &self.videos)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl AttachmentFetcher {
    /// Creates a fetcher with the default JPEG quality.
    #[must_use]
    pub fn new(
        resolver: PathResolver,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn MessageStore>,
        videos: VideoThumbnailGenerator,
    ) -> Self {
        Self {
            resolver,
            transport,
            store,
            videos,
            jpeg_quality: DEFAULT_THUMBNAIL_QUALITY,
        }
    }

    /// Overrides the JPEG quality, clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Cache path of `file_name` for a content type.
    #[must_use]
    pub fn resolve_local_path(
        &self,
        file_name: &str,
        content_type: &str,
        is_thumbnail: bool,
    ) -> PathBuf {
        self.resolver.resolve(content_type, file_name, is_thumbnail)
    }

    /// Returns the thumbnail of an image attachment, downloading and
    /// subsampling it to at least `width`x`height` on a cache miss.
    ///
    /// The result always lands in the thumbnail directory, whatever
    /// rendition `reference` asks for, so it never shadows the full file.
    ///
    /// # Errors
    /// Returns `Status` for non-success responses, a network error if the
    /// transfer fails, `Decode` if the bytes are not an image, or `Io` if the
    /// thumbnail cannot be written. No file is left behind on failure.
    #[instrument(skip(self), fields(url = %reference.remote_url))]
    pub fn fetch_thumbnail(
        &self,
        reference: &AttachmentRef,
        width: u32,
        height: u32,
    ) -> FetchResult<LoadedThumbnail> {
        let entry = self.resolver.thumbnail_entry(reference);
        let target = DecodeTarget::new(width, height);

        if let Some(cached) = load_cached(entry.path(), target) {
            debug!(path = %entry.path().display(), "Thumbnail cache hit");
            return Ok(LoadedThumbnail {
                path: entry.absolute_path,
                image: Arc::new(cached.image),
                source: ThumbnailSource::DiskCache,
            });
        }

        let image = self.download_image(&reference.remote_url, entry.path(), target)?;
        Ok(LoadedThumbnail {
            path: entry.absolute_path,
            image: Arc::new(image),
            source: ThumbnailSource::Network,
        })
    }

    /// Returns the thumbnail of a local video.
    ///
    /// With a `server_url` the server rendition is downloaded, otherwise a
    /// frame is extracted locally. Both land on the same path, so either
    /// satisfies later calls.
    ///
    /// # Errors
    /// Returns the download errors of [`Self::fetch_thumbnail`] when a server
    /// URL is given, or the extraction errors of
    /// [`VideoThumbnailGenerator::extract_frame`] otherwise.
    #[instrument(skip(self))]
    pub fn fetch_or_generate_video_thumbnail(
        &self,
        local_video: &Path,
        server_url: Option<&str>,
    ) -> FetchResult<LoadedThumbnail> {
        if let Some(cached) = VideoThumbnailGenerator::cached(local_video)? {
            return Ok(cached);
        }

        match server_url {
            Some(url) => {
                let path = VideoThumbnailGenerator::thumbnail_path(local_video)?;
                if let Some(dir) = path.parent() {
                    super::path_resolver::ensure_dir(dir);
                }
                let image = self.download_image(url, &path, DecodeTarget::original())?;
                Ok(LoadedThumbnail {
                    path,
                    image: Arc::new(image),
                    source: ThumbnailSource::Network,
                })
            }
            None => self.videos.extract_frame(local_video),
        }
    }

    /// Downloads a contact card and records its path in the message store.
    ///
    /// # Errors
    /// See [`Self::fetch_attachment`].
    pub fn fetch_contact_card(&self, reference: &AttachmentRef) -> FetchResult<PathBuf> {
        if reference.category() != AttachmentCategory::Contact {
            warn!(
                content_type = %reference.content_type,
                "Contact card requested for a non-contact attachment"
            );
        }
        self.fetch_attachment(reference)
    }

    /// Downloads the full attachment into its category directory and records
    /// its path in the message store.
    ///
    /// The store is also updated on a cache hit, so an update lost to an
    /// earlier failure is repaired by retrying.
    ///
    /// # Errors
    /// Returns `Status`, network, or `Io` errors from the download, or
    /// `Store` if the message store rejects the update. The downloaded file
    /// is kept in the latter case.
    #[instrument(skip(self), fields(url = %reference.remote_url))]
    pub fn fetch_attachment(&self, reference: &AttachmentRef) -> FetchResult<PathBuf> {
        let entry = self.resolver.attachment_entry(reference);

        if entry.exists() {
            debug!(path = %entry.path().display(), "Attachment cache hit");
        } else {
            self.download_raw(&reference.remote_url, entry.path())?;
        }

        self.report(&reference.message_key, entry.path())?;
        Ok(entry.absolute_path)
    }

    /// Downloads `url` as an opaque file named after the URL.
    ///
    /// `category_hint` is a content type choosing the directory and
    /// extension. The content is not validated.
    ///
    /// # Errors
    /// Returns `Status`, network, or `Io` errors from the download.
    #[instrument(skip(self))]
    pub fn fetch_generic(&self, url: &str, category_hint: &str) -> FetchResult<PathBuf> {
        let name = generic_file_name(url, category_hint);
        let path = self.resolver.resolve(category_hint, &name, false);

        if path.is_file() {
            debug!(path = %path.display(), "Generic file cache hit");
            return Ok(path);
        }
        self.download_raw(url, &path)?;
        Ok(path)
    }

    /// Decodes a profile image at [`PROFILE_IMAGE_BOUNDS`]. Nothing is
    /// persisted.
    ///
    /// # Errors
    /// Returns `Status` or network errors, or `Decode` if the header does not
    /// fit in [`PROFILE_MARK_LIMIT`] bytes or the bytes are not an image.
    #[instrument(skip(self))]
    pub fn fetch_profile_image(&self, url: &str) -> FetchResult<DynamicImage> {
        let response = self.open(url)?;
        let decoded = decode_with_mark_limit(
            ReplayableStream::new(response.body),
            PROFILE_IMAGE_BOUNDS,
            PROFILE_MARK_LIMIT,
        )?;
        Ok(decoded.image)
    }

    /// Copies a local file into the cache under a date-stamped name.
    ///
    /// # Errors
    /// Returns `NotFound` if `source` is missing, or `Io` if the copy fails.
    #[instrument(skip(self))]
    pub fn import_local_file(&self, source: &Path, content_type: &str) -> FetchResult<PathBuf> {
        let mut input = File::open(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(source.display().to_string()),
            _ => FetchError::io(source, e),
        })?;

        let extension = extension_for(content_type)
            .or_else(|| {
                source
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            })
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let stamp = chrono::Local::now().format(IMPORT_NAME_FORMAT).to_string();

        let dest = self
            .resolver
            .resolve(content_type, &format!("{stamp}.{extension}"), false);
        let (path, bytes) = write_unique(&dest, |writer| {
            io::copy(&mut input, writer).map_err(|e| FetchError::io(source, e))
        })?;
        info!(source = %source.display(), path = %path.display(), bytes, "Imported local file");
        Ok(path)
    }

    fn open(&self, url: &str) -> FetchResult<HttpResponse> {
        let response = self.transport.open(url)?;
        if !response.is_success() {
            warn!(url, status = response.status, "Download rejected");
            return Err(FetchError::status(response.status));
        }
        Ok(response)
    }

    fn download_image(
        &self,
        url: &str,
        dest: &Path,
        target: DecodeTarget,
    ) -> FetchResult<DynamicImage> {
        let response = self.open(url)?;
        let decoded = decode_bounds_then_sampled(ReplayableStream::new(response.body), target)?;
        save_image(dest, &decoded.image, self.jpeg_quality)?;
        info!(
            url,
            path = %dest.display(),
            width = decoded.image.width(),
            height = decoded.image.height(),
            sample_factor = decoded.sample_factor,
            "Cached image"
        );
        Ok(decoded.image)
    }

    fn download_raw(&self, url: &str, dest: &Path) -> FetchResult<u64> {
        let mut response = self.open(url)?;
        let bytes = copy_to_file(&mut response.body, dest)?;
        info!(url, path = %dest.display(), bytes, "Cached file");
        Ok(bytes)
    }

    fn report(&self, attachment_id: &str, path: &Path) -> FetchResult<()> {
        self.store
            .update_local_path(attachment_id, path)
            .map_err(|e| match e {
                FetchError::Store { .. } => e,
                other => FetchError::store(other.to_string()),
            })
    }
}

/// Deterministic file name for an opaque download:
/// 32 hex chars of the URL digest plus the hint's extension.
#[must_use]
pub fn generic_file_name(url: &str, category_hint: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let extension = extension_for(category_hint)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{}.{extension}", hex::encode(&digest[..16]))
}
