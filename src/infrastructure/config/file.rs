//! Locating, loading, and seeding the TOML configuration file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::app_config::AppConfig;
use super::args::GlobalArgs;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform config directory and no explicit path.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// The file or its directory could not be read or written.
    #[error("config file '{path}': {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Defaults could not be serialized.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// The configuration file backing an [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// Uses `path`, or the platform config path when `None`.
    ///
    /// # Errors
    /// Returns `ConfigDirNotFound` if no path is given and the platform has
    /// no config directory.
    pub fn locate(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => AppConfig::default_config_path().ok_or(ConfigError::ConfigDirNotFound)?,
        };
        Ok(Self { path })
    }

    /// Uses exactly `path`.
    #[must_use]
    pub const fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the configuration.
    ///
    /// A missing file is seeded with the defaults. A malformed file is left
    /// untouched and the defaults are used.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read or seeded.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Config file not found, creating default");
                let config = AppConfig::default();
                self.save(&config)?;
                return Ok(config);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(toml::from_str::<AppConfig>(&content).unwrap_or_else(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to parse config file, using defaults"
            );
            AppConfig::default()
        }))
    }

    /// Reads the configuration and applies command line overrides.
    ///
    /// # Errors
    /// See [`Self::load`].
    pub fn load_with_args(&self, args: GlobalArgs) -> Result<AppConfig, ConfigError> {
        let mut config = self.load()?;
        config.config = Some(self.path.clone());
        config.merge_with_args(args);
        debug!(path = %self.path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Writes `config` through a temp file renamed into place.
    ///
    /// # Errors
    /// Returns `TomlSer` if serialization fails, or `Io`.
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(config)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| self.io_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
