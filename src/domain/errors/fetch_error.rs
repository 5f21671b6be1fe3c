//! Attachment fetch error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for attachment operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Pipeline stage a decode failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// Reading image dimensions.
    Bounds,
    /// Rewinding the stream to the mark.
    Replay,
    /// Decoding the sampled raster.
    Raster,
    /// Encoding the image for persistence.
    Encode,
    /// Extracting a still frame from a video.
    FrameExtraction,
}

impl std::fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounds => write!(f, "bounds"),
            Self::Replay => write!(f, "replay"),
            Self::Raster => write!(f, "raster"),
            Self::Encode => write!(f, "encode"),
            Self::FrameExtraction => write!(f, "frame extraction"),
        }
    }
}

/// Attachment fetch error variants.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The request or body transfer failed.
    #[error("network error: {message}")]
    Network {
        /// Failure description.
        message: String,
    },

    /// A connect or read timeout elapsed.
    #[error("network timeout: {message}")]
    NetworkTimeout {
        /// Failure description.
        message: String,
    },

    /// Bytes could not be decoded or encoded.
    #[error("decode failed during {stage}: {cause}")]
    Decode {
        /// Failing stage.
        stage: DecodeStage,
        /// Underlying cause.
        cause: String,
    },

    /// Local filesystem failure.
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Required input is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The message store rejected a path update.
    #[error("message store update failed: {message}")]
    Store {
        /// Failure description.
        message: String,
    },

    /// An upload was rejected or its response could not be read.
    #[error("upload failed: {message}")]
    Upload {
        /// Failure description.
        message: String,
    },
}

impl FetchError {
    /// Creates a status error.
    #[must_use]
    pub const fn status(status: u16) -> Self {
        Self::Status { status }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::NetworkTimeout {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(stage: DecodeStage, cause: impl std::fmt::Display) -> Self {
        Self::Decode {
            stage,
            cause: cause.to_string(),
        }
    }

    /// Creates an I/O error bound to a path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Classifies an error raised while reading a response body.
    #[must_use]
    pub fn from_body_read(source: &std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(source.to_string())
        } else {
            Self::network(format!("failed to read body: {source}"))
        }
    }

    /// Creates a message store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates an upload error.
    #[must_use]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns whether error is network related.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Network { .. } | Self::NetworkTimeout { .. }
        )
    }

    /// Returns whether error came from decoding.
    #[must_use]
    pub const fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_read_timeout_is_classified() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        assert!(matches!(
            FetchError::from_body_read(&err),
            FetchError::NetworkTimeout { .. }
        ));

        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            FetchError::from_body_read(&err),
            FetchError::Network { .. }
        ));
    }

    #[test]
    fn test_classification() {
        assert!(FetchError::status(404).is_network_error());
        assert_eq!(FetchError::status(404).http_status(), Some(404));
        assert!(FetchError::decode(DecodeStage::Bounds, "bad header").is_decode_error());
        assert!(!FetchError::NotFound("x".into()).is_network_error());
    }

    #[test]
    fn test_decode_message_names_stage() {
        let err = FetchError::decode(DecodeStage::FrameExtraction, "no video stream");
        assert_eq!(
            err.to_string(),
            "decode failed during frame extraction: no video stream"
        );
    }
}
