//! Two-pass image decoding over a single byte stream.
//!
//! The first pass probes only the image header to learn its dimensions. The
//! stream is then rewound to its mark and the second pass decodes the raster
//! at the chosen subsample factor, so the body is fetched exactly once.

use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, ImageResult};
use tracing::{debug, trace, warn};

use crate::domain::entities::DecodeTarget;
use crate::domain::errors::{DecodeStage, FetchError, FetchResult};

use super::replay_stream::{ReplayableStream, UNBOUNDED};

/// Bytes pulled from the source per header probe.
pub const PROBE_CHUNK: usize = 8 * 1024;

/// Result of a sampled decode.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// The decoded, subsampled image.
    pub image: DynamicImage,
    /// Dimensions declared by the source header.
    pub source_dimensions: (u32, u32),
    /// Subsample factor applied.
    pub sample_factor: u32,
}

/// Decodes bounds first, then the raster at the subsample factor for
/// `target`, reading the underlying source only once.
///
/// The stream is closed before returning, on every path.
///
/// # Errors
/// Returns `Decode` with stage `Bounds` or `Raster` when the bytes are not a
/// supported image, or a network error if the source fails mid-read.
pub fn decode_bounds_then_sampled<R: Read>(
    stream: ReplayableStream<R>,
    target: DecodeTarget,
) -> FetchResult<DecodedImage> {
    decode_with_mark_limit(stream, target, UNBOUNDED)
}

/// Like [`decode_bounds_then_sampled`], but buffers at most `mark_limit`
/// bytes for the bounds pass.
///
/// # Errors
/// Additionally returns `Decode` with stage `Replay` when the header does
/// not fit within `mark_limit`.
pub fn decode_with_mark_limit<R: Read>(
    mut stream: ReplayableStream<R>,
    target: DecodeTarget,
    mark_limit: usize,
) -> FetchResult<DecodedImage> {
    let result = run_passes(&mut stream, target, mark_limit);
    stream.close();
    result
}

fn run_passes<R: Read>(
    stream: &mut ReplayableStream<R>,
    target: DecodeTarget,
    mark_limit: usize,
) -> FetchResult<DecodedImage> {
    stream.allow_marks_to_expire(false);
    let mark = stream.mark(mark_limit);

    let (width, height) = probe_in_chunks(stream, PROBE_CHUNK.min(mark_limit).max(1))?;
    let sample_factor = target.sample_factor(width, height);
    debug!(
        width,
        height,
        sample_factor,
        probed = stream.position(),
        "Decoded image bounds"
    );

    stream
        .reset(mark)
        .map_err(|e| FetchError::decode(DecodeStage::Replay, e))?;
    stream.allow_marks_to_expire(true);

    let image = decode_sampled(stream, sample_factor)?;
    Ok(DecodedImage {
        image,
        source_dimensions: (width, height),
        sample_factor,
    })
}

/// Reads just enough of `reader` to learn the image dimensions.
///
/// # Errors
/// Returns `Decode` with stage `Bounds` if the source ends before a
/// recognizable header, or a network error if reading fails.
pub fn read_dimensions<R: Read>(reader: &mut R) -> FetchResult<(u32, u32)> {
    probe_in_chunks(reader, PROBE_CHUNK)
}

fn probe_in_chunks<R: Read>(reader: &mut R, chunk_len: usize) -> FetchResult<(u32, u32)> {
    let mut header = Vec::with_capacity(chunk_len);
    let mut chunk = vec![0u8; chunk_len];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FetchError::from_body_read(&e)),
        };
        header.extend_from_slice(&chunk[..n]);

        match probe_dimensions(&header) {
            Ok(dimensions) => return Ok(dimensions),
            Err(e) if n == 0 => {
                return Err(FetchError::decode(
                    DecodeStage::Bounds,
                    format!("no image header in {} bytes: {e}", header.len()),
                ));
            }
            Err(e) => trace!(probed = header.len(), error = %e, "Header incomplete"),
        }
    }
}

/// Decodes the full raster from `reader` and downsamples it by `factor`.
///
/// # Errors
/// Returns `Decode` with stage `Raster` if the bytes cannot be decoded, or a
/// network error if reading fails.
pub fn decode_sampled<R: Read>(reader: &mut R, factor: u32) -> FetchResult<DynamicImage> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| FetchError::from_body_read(&e))?;

    let image = image::load_from_memory(&bytes)
        .map_err(|e| FetchError::decode(DecodeStage::Raster, e))?;

    if factor <= 1 {
        return Ok(image);
    }
    let (width, height) =
        DecodeTarget::sampled_dimensions(image.width(), image.height(), factor);
    Ok(image.resize_exact(width, height, FilterType::Triangle))
}

/// Decodes a cached file through the same two-pass pipeline.
///
/// Returns `None` when the file is absent. A file that exists but cannot be
/// decoded is removed so the next fetch treats it as a miss.
#[must_use]
pub fn load_cached(path: &Path, target: DecodeTarget) -> Option<DecodedImage> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to open cached file");
            }
            return None;
        }
    };

    match decode_bounds_then_sampled(ReplayableStream::new(file), target) {
        Ok(decoded) => {
            trace!(path = %path.display(), "Decoded cached image");
            Some(decoded)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cached image is corrupt, discarding");
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove corrupt cache entry");
            }
            None
        }
    }
}

fn probe_dimensions(header: &[u8]) -> ImageResult<(u32, u32)> {
    ImageReader::new(Cursor::new(header))
        .with_guessed_format()?
        .into_dimensions()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::codecs::jpeg::JpegEncoder;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::{Cursor, Read};

    /// Deterministic noisy image that compresses poorly.
    pub fn noise_image(width: u32, height: u32) -> DynamicImage {
        let mut seed: u32 = 0x2545_f491;
        let img = RgbImage::from_fn(width, height, |_, _| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let [r, g, b, _] = seed.to_le_bytes();
            Rgb([r, g, b])
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Smooth gradient image.
    pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&gradient_image(width, height).to_rgb8())
            .unwrap();
        out
    }

    /// Reader returning at most `chunk` bytes per call.
    pub struct Trickle<R> {
        pub inner: R,
        pub chunk: usize,
    }

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..len])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn replayable(bytes: Vec<u8>) -> ReplayableStream<Cursor<Vec<u8>>> {
        ReplayableStream::new(Cursor::new(bytes))
    }

    #[test]
    fn test_jpeg_is_subsampled_to_requested_bounds() {
        let stream = replayable(jpeg_bytes(800, 400));
        let target = DecodeTarget::new(200, 100);
        let decoded = decode_bounds_then_sampled(stream, target).unwrap();

        assert_eq!(decoded.source_dimensions, (800, 400));
        assert_eq!(decoded.sample_factor, 4);
        assert_eq!((decoded.image.width(), decoded.image.height()), (200, 100));
    }

    #[test]
    fn test_bounds_larger_than_source_keep_resolution() {
        let source = gradient_image(120, 80);
        let bytes = png_bytes(&source);

        let target = DecodeTarget::new(500, 500);
        let decoded = decode_bounds_then_sampled(replayable(bytes), target).unwrap();

        assert_eq!(decoded.sample_factor, 1);
        assert_eq!(decoded.image.to_rgb8(), source.to_rgb8());
    }

    #[test]
    fn test_replay_matches_direct_decode() {
        let bytes = png_bytes(&noise_image(256, 192));
        let target = DecodeTarget::new(64, 48);

        let stream = ReplayableStream::new(Trickle {
            inner: Cursor::new(bytes.clone()),
            chunk: 7,
        });
        let replayed = decode_bounds_then_sampled(stream, target).unwrap();

        let direct = decode_sampled(&mut Cursor::new(bytes), replayed.sample_factor).unwrap();
        assert_eq!(replayed.sample_factor, 4);
        assert_eq!(replayed.image.to_rgba8(), direct.to_rgba8());
    }

    #[test]
    fn test_bounds_probe_reads_only_a_prefix() {
        let bytes = png_bytes(&noise_image(256, 256));
        let mut stream = replayable(bytes.clone());
        stream.mark(UNBOUNDED);

        let dims = read_dimensions(&mut stream).unwrap();

        assert_eq!(dims, (256, 256));
        assert!(stream.position() < bytes.len() as u64);
        assert_eq!(stream.buffered_len() as u64, stream.position());
    }

    #[test]
    fn test_garbage_fails_at_bounds_stage() {
        let err = decode_bounds_then_sampled(
            replayable(b"definitely not an image".to_vec()),
            DecodeTarget::new(10, 10),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            FetchError::Decode {
                stage: DecodeStage::Bounds,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_body_fails_at_bounds_stage() {
        let target = DecodeTarget::original();
        let err = decode_bounds_then_sampled(replayable(Vec::new()), target).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Decode {
                stage: DecodeStage::Bounds,
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_raster_fails_at_raster_stage() {
        let mut bytes = png_bytes(&noise_image(256, 256));
        bytes.truncate(PROBE_CHUNK * 2);

        let target = DecodeTarget::original();
        let err = decode_bounds_then_sampled(replayable(bytes), target).unwrap_err();

        assert!(matches!(
            err,
            FetchError::Decode {
                stage: DecodeStage::Raster,
                ..
            }
        ));
    }

    #[test]
    fn test_load_cached_decodes_and_samples() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pic.png");
        std::fs::write(&path, png_bytes(&gradient_image(40, 20))).unwrap();

        let decoded = load_cached(&path, DecodeTarget::new(10, 5)).unwrap();
        assert_eq!(decoded.sample_factor, 4);
        assert_eq!((decoded.image.width(), decoded.image.height()), (10, 5));
    }

    #[test]
    fn test_load_cached_discards_corrupt_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pic.png");
        std::fs::write(&path, b"garbage").unwrap();

        assert!(load_cached(&path, DecodeTarget::original()).is_none());
        assert!(!path.exists());
        assert!(load_cached(&path, DecodeTarget::original()).is_none());
    }

    #[test]
    fn test_small_mark_limit_fits_png_header() {
        let bytes = png_bytes(&noise_image(300, 150));
        assert!(bytes.len() > 1024);

        let target = DecodeTarget::new(100, 50);
        let decoded = decode_with_mark_limit(replayable(bytes), target, 1024).unwrap();
        assert_eq!(decoded.sample_factor, 3);
        assert_eq!((decoded.image.width(), decoded.image.height()), (100, 50));
    }
}
