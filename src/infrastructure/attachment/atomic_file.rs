//! Temp-then-rename writes for cache entries.
//!
//! Cache files are written to a hidden sibling and renamed into place only
//! once complete, so a reader never observes a partial entry. A failed write
//! drops the temp file, which deletes it.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::domain::errors::{DecodeStage, FetchError, FetchResult};

/// Prefix of in-progress cache files.
pub const PARTIAL_PREFIX: &str = ".partial-";

const COPY_BUFFER: usize = 8 * 1024;

const MAX_UNIQUE_ATTEMPTS: u32 = 1000;

/// Writes `dest` through `fill`, publishing it only if `fill` succeeds.
///
/// # Errors
/// Returns the error from `fill`, or `Io` if the temp file cannot be created,
/// flushed, or renamed.
pub fn write_atomically<T, F>(dest: &Path, fill: F) -> FetchResult<T>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> FetchResult<T>,
{
    let (temp, value) = stage(dest, fill)?;
    temp.persist(dest)
        .map_err(|e| FetchError::io(dest, e.error))?;
    debug!(path = %dest.display(), "Published cache entry");
    Ok(value)
}

/// Like [`write_atomically`], but never replaces an existing file.
///
/// When `dest` is taken the entry is published as `<stem>_1.<ext>`,
/// `<stem>_2.<ext>` and so on. Each attempt is an exclusive rename, so
/// concurrent writers always end up with distinct files.
///
/// # Errors
/// Returns the error from `fill`, or `Io` if the entry cannot be written or
/// no free name is found.
pub fn write_unique<T, F>(dest: &Path, fill: F) -> FetchResult<(PathBuf, T)>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> FetchResult<T>,
{
    let (mut temp, value) = stage(dest, fill)?;
    for suffix in 0..MAX_UNIQUE_ATTEMPTS {
        let candidate = numbered(dest, suffix);
        match temp.persist_noclobber(&candidate) {
            Ok(_) => {
                debug!(path = %candidate.display(), "Published cache entry");
                return Ok((candidate, value));
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                trace!(path = %candidate.display(), "Name taken");
                temp = e.file;
            }
            Err(e) => return Err(FetchError::io(&candidate, e.error)),
        }
    }
    let exhausted = std::io::Error::new(ErrorKind::AlreadyExists, "no free file name");
    Err(FetchError::io(dest, exhausted))
}

fn stage<T, F>(dest: &Path, fill: F) -> FetchResult<(NamedTempFile, T)>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> FetchResult<T>,
{
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| FetchError::io(dir, e))?;
    trace!(temp = %temp.path().display(), dest = %dest.display(), "Writing cache entry");

    let value = {
        let mut writer = BufWriter::new(temp.as_file_mut());
        let value = fill(&mut writer)?;
        writer.flush().map_err(|e| FetchError::io(dest, e))?;
        value
    };
    temp.as_file()
        .sync_all()
        .map_err(|e| FetchError::io(dest, e))?;
    Ok((temp, value))
}

/// `dest` itself for 0, `<stem>_<suffix>.<ext>` otherwise.
fn numbered(dest: &Path, suffix: u32) -> PathBuf {
    if suffix == 0 {
        return dest.to_path_buf();
    }
    let stem = dest.file_stem().unwrap_or_default().to_string_lossy();
    let name = match dest.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    dest.with_file_name(name)
}

/// Copies `body` into `dest` atomically, returning the byte count.
///
/// # Errors
/// Read failures map to network errors, write failures to `Io`.
pub fn copy_to_file<R: Read>(body: &mut R, dest: &Path) -> FetchResult<u64> {
    write_atomically(dest, |writer| {
        let mut buf = vec![0u8; COPY_BUFFER];
        let mut total = 0u64;
        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FetchError::from_body_read(&e)),
            };
            writer
                .write_all(&buf[..n])
                .map_err(|e| FetchError::io(dest, e))?;
            total += n as u64;
        }
        Ok(total)
    })
}

/// Encodes `image` into `dest` atomically, choosing the format from the
/// file extension (PNG when unknown). JPEG output uses `jpeg_quality`.
///
/// # Errors
/// Returns `Decode` with stage `Encode` if encoding fails, or `Io`.
pub fn save_image(dest: &Path, image: &DynamicImage, jpeg_quality: u8) -> FetchResult<()> {
    let format = ImageFormat::from_path(dest).unwrap_or(ImageFormat::Png);
    write_atomically(dest, |writer| {
        let encoded = if format == ImageFormat::Jpeg {
            JpegEncoder::new_with_quality(writer, jpeg_quality).encode_image(&image.to_rgb8())
        } else {
            image.write_to(writer, format)
        };
        encoded.map_err(|e| FetchError::decode(DecodeStage::Encode, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served {
                return Err(std::io::Error::new(ErrorKind::ConnectionReset, "reset"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"part");
            Ok(4)
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_copy_publishes_complete_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("card.vcf");

        let n = copy_to_file(&mut Cursor::new(b"BEGIN:VCARD".to_vec()), &dest).unwrap();

        assert_eq!(n, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"BEGIN:VCARD");
        assert_eq!(entries(temp.path()), vec!["card.vcf".to_string()]);
    }

    #[test]
    fn test_failed_copy_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("card.vcf");

        let err = copy_to_file(&mut FailingReader { served: false }, &dest).unwrap_err();

        assert!(err.is_network_error());
        assert!(!dest.exists());
        assert!(entries(temp.path()).is_empty());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing").join("a.bin");

        let err = copy_to_file(&mut Cursor::new(vec![1, 2, 3]), &dest).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn test_unique_write_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.txt");
        std::fs::write(&dest, b"first").unwrap();
        std::fs::write(temp.path().join("a_1.txt"), b"second").unwrap();

        let (path, n) = write_unique(&dest, |writer| {
            writer.write_all(b"third").unwrap();
            Ok(5)
        })
        .unwrap();

        assert_eq!(n, 5);
        assert_eq!(path, temp.path().join("a_2.txt"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"first");
        assert_eq!(std::fs::read(&path).unwrap(), b"third");
        assert_eq!(entries(temp.path()).len(), 3);
    }

    #[test]
    fn test_concurrent_unique_writes_get_distinct_names() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("20260101_120000.bin");
        let barrier = std::sync::Barrier::new(4);

        let mut paths: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4u8)
                .map(|i| {
                    let (dest, barrier) = (&dest, &barrier);
                    scope.spawn(move || {
                        let (path, ()) = write_unique(dest, |writer| {
                            barrier.wait();
                            writer.write_all(&[i; 64]).unwrap();
                            Ok(())
                        })
                        .unwrap();
                        assert_eq!(std::fs::read(&path).unwrap(), vec![i; 64]);
                        path
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 4);
        let names = entries(temp.path());
        assert!(!names.iter().any(|n| n.starts_with(PARTIAL_PREFIX)));
    }

    #[test]
    fn test_numbered_names_keep_extension() {
        let dest = Path::new("/c/image/20260101_120000.jpeg");
        assert_eq!(numbered(dest, 0), dest);
        assert_eq!(numbered(dest, 3), Path::new("/c/image/20260101_120000_3.jpeg"));
        assert_eq!(numbered(Path::new("/c/notes"), 1), Path::new("/c/notes_1"));
    }

    #[test]
    fn test_save_image_picks_format_from_extension() {
        let temp = TempDir::new().unwrap();
        let image = DynamicImage::new_rgba8(4, 3);

        let jpeg = temp.path().join("a.jpeg");
        save_image(&jpeg, &image, 50).unwrap();
        assert_eq!(
            image::guess_format(&std::fs::read(&jpeg).unwrap()).unwrap(),
            ImageFormat::Jpeg
        );

        let png = temp.path().join("b.png");
        save_image(&png, &image, 50).unwrap();
        let reloaded = image::open(&png).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (4, 3));
    }
}
