//! Frame extraction through the `ffmpeg` command line tool.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::DynamicImage;
use tracing::{debug, warn};

use crate::domain::ports::FrameExtractor;

/// Offset of the extracted frame from the start of the video.
pub const DEFAULT_SEEK_SECONDS: f64 = 1.0;

/// Extracts stills by piping a single PNG frame out of `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    ffmpeg_path: PathBuf,
    seek_seconds: f64,
}

impl FfmpegFrameExtractor {
    /// Creates an extractor running the given `ffmpeg` binary.
    #[must_use]
    pub fn new(ffmpeg_path: impl Into<PathBuf>, seek_seconds: f64) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            seek_seconds: seek_seconds.max(0.0),
        }
    }

    fn run(&self, video: &Path, seek_seconds: f64) -> Result<Vec<u8>, String> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-ss", &format!("{seek_seconds:.3}")])
            .arg("-i")
            .arg(video)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to run {}: {e}", self.ffmpeg_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("ffmpeg exited with {}: {}", output.status, stderr.trim()));
        }
        Ok(output.stdout)
    }
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new("ffmpeg", DEFAULT_SEEK_SECONDS)
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn extract_frame(&self, video: &Path) -> Result<DynamicImage, String> {
        let mut frame = self.run(video, self.seek_seconds)?;

        // Clips shorter than the seek offset produce no frame.
        if frame.is_empty() && self.seek_seconds > 0.0 {
            warn!(video = %video.display(), "No frame at seek offset, retrying from start");
            frame = self.run(video, 0.0)?;
        }
        if frame.is_empty() {
            return Err(format!("no video frame in {}", video.display()));
        }

        let image = image::load_from_memory(&frame).map_err(|e| e.to_string())?;
        debug!(
            video = %video.display(),
            width = image.width(),
            height = image.height(),
            "Extracted video frame"
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_reported() {
        let extractor = FfmpegFrameExtractor::new("/nonexistent/ffmpeg", 1.0);
        let err = extractor
            .extract_frame(Path::new("/tmp/clip.mp4"))
            .unwrap_err();
        assert!(err.contains("failed to run /nonexistent/ffmpeg"));
    }

    #[test]
    fn test_negative_seek_is_clamped() {
        let extractor = FfmpegFrameExtractor::new("ffmpeg", -3.0);
        assert!(extractor.seek_seconds.abs() < f64::EPSILON);
    }
}
