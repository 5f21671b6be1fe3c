//! Application configuration.

pub mod app_config;
pub mod args;
pub mod file;

pub use app_config::{AppConfig, LogLevel, NetworkConfig, ServerConfig, StorageConfig, VideoConfig};
pub use args::{AttachmentArgs, CliArgs, Command, GlobalArgs};
pub use file::{ConfigError, ConfigFile};
