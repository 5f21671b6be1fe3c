//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::ports::FallbackLayout;
use crate::infrastructure::attachment::{DEFAULT_JPEG_QUALITY, DEFAULT_THUMBNAIL_QUALITY};
use crate::infrastructure::http::DEFAULT_UPLOAD_FIELD;
use crate::infrastructure::media::DEFAULT_SEEK_SECONDS;

use super::args::GlobalArgs;

const APP_NAME: &str = "attachment-cache";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from TOML and overridden by CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Cache storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Transport settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Local video thumbnail settings.
    #[serde(default)]
    pub video: VideoConfig,

    /// Attachment server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Cache storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Primary cache root. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Always-available fallback root. Defaults to the platform cache
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_root: Option<PathBuf>,

    /// Layout under the fallback root.
    #[serde(default)]
    pub fallback_layout: FallbackLayout,

    /// Message store file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_store: Option<PathBuf>,

    /// JPEG quality of cached image thumbnails.
    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            fallback_root: None,
            fallback_layout: FallbackLayout::default(),
            message_store: None,
            thumbnail_quality: default_thumbnail_quality(),
        }
    }
}

impl StorageConfig {
    /// Returns effective message store path.
    #[must_use]
    pub fn effective_message_store(&self) -> PathBuf {
        self.message_store.clone().unwrap_or_else(|| {
            ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
                || std::env::temp_dir().join(APP_NAME).join("messages.json"),
                |dirs| dirs.data_dir().join("messages.json"),
            )
        })
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Whole-request timeout in seconds, body transfer included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl NetworkConfig {
    /// Whole-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Video thumbnail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// `ffmpeg` binary used for frame extraction.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Offset of the extracted frame in seconds.
    #[serde(default = "default_seek_seconds")]
    pub seek_seconds: f64,

    /// JPEG quality of generated thumbnails.
    #[serde(default = "default_video_quality")]
    pub jpeg_quality: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            seek_seconds: default_seek_seconds(),
            jpeg_quality: default_video_quality(),
        }
    }
}

/// Attachment server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the attachment server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Multipart field carrying uploaded files.
    #[serde(default = "default_upload_field")]
    pub upload_field: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_field: default_upload_field(),
        }
    }
}

fn default_thumbnail_quality() -> u8 {
    DEFAULT_THUMBNAIL_QUALITY
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_seek_seconds() -> f64 {
    DEFAULT_SEEK_SECONDS
}

fn default_video_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_upload_field() -> String {
    DEFAULT_UPLOAD_FIELD.to_string()
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: GlobalArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(root) = args.root {
            self.storage.root = Some(root);
        }
        if let Some(fallback_root) = args.fallback_root {
            self.storage.fallback_root = Some(fallback_root);
        }
        if let Some(categorized) = args.categorized_fallback {
            self.storage.fallback_layout = if categorized {
                FallbackLayout::Categorized
            } else {
                FallbackLayout::Collapsed
            };
        }
        if let Some(message_store) = args.message_store {
            self.storage.message_store = Some(message_store);
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.network.timeout_secs = timeout_secs;
        }
        if let Some(ffmpeg_path) = args.ffmpeg_path {
            self.video.ffmpeg_path = ffmpeg_path;
        }
        if let Some(base_url) = args.base_url {
            self.server.base_url = base_url;
        }
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("attachment-cache.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [storage]
            root = "/srv/attachments"
            fallback_layout = "categorized"

            [video]
            seek_seconds = 2.5

            [server]
            base_url = "https://chat.example.com"
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.storage.root, Some(PathBuf::from("/srv/attachments")));
        assert_eq!(config.storage.fallback_layout, FallbackLayout::Categorized);
        assert!((config.video.seek_seconds - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.video.jpeg_quality, 50);
        assert_eq!(config.server.base_url, "https://chat.example.com");
        assert_eq!(config.server.upload_field, "files[]");
        assert_eq!(config.network.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.storage.root.is_none());
        assert_eq!(config.storage.fallback_layout, FallbackLayout::Collapsed);
        assert_eq!(config.video.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert!(config.network.user_agent.starts_with("attachment-cache/"));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let serialized = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.network.connect_timeout_secs, 15);
        assert_eq!(parsed.storage.thumbnail_quality, DEFAULT_THUMBNAIL_QUALITY);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = AppConfig::default();
        config.merge_with_args(GlobalArgs {
            root: Some(PathBuf::from("/tmp/root")),
            categorized_fallback: Some(true),
            base_url: Some("https://other.example.com".to_string()),
            ..GlobalArgs::default()
        });

        assert_eq!(config.storage.root, Some(PathBuf::from("/tmp/root")));
        assert_eq!(config.storage.fallback_layout, FallbackLayout::Categorized);
        assert_eq!(config.server.base_url, "https://other.example.com");
    }
}
