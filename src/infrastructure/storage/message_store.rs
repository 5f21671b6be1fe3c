//! JSON-file message store recording attachment paths.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::MessageStore;

/// Message store persisting `attachment id -> local paths` as JSON.
#[derive(Debug)]
pub struct JsonMessageStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Vec<PathBuf>>>,
}

impl JsonMessageStore {
    /// Opens the store at `path`, starting empty if the file is missing or
    /// unreadable.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse message store, starting empty"
                );
                BTreeMap::new()
            }),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to read message store");
                }
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Returns the recorded local paths of an attachment.
    #[must_use]
    pub fn local_paths(&self, attachment_id: &str) -> Vec<PathBuf> {
        self.entries
            .lock()
            .get(attachment_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &BTreeMap<String, Vec<PathBuf>>) -> FetchResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| FetchError::io(dir, e))?;

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| FetchError::store(format!("failed to serialize store: {e}")))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| FetchError::io(dir, e))?;
        temp.write_all(&json)
            .map_err(|e| FetchError::io(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| FetchError::io(&self.path, e.error))?;
        Ok(())
    }
}

impl MessageStore for JsonMessageStore {
    fn update_local_path(&self, attachment_id: &str, path: &Path) -> FetchResult<()> {
        let mut entries = self.entries.lock();
        if entries
            .get(attachment_id)
            .is_some_and(|paths| paths.iter().any(|p| p == path))
        {
            return Ok(());
        }

        // Committed in memory only once the file holds it.
        let mut updated = entries.clone();
        updated
            .entry(attachment_id.to_string())
            .or_default()
            .push(path.to_path_buf());
        self.save(&updated)?;
        *entries = updated;
        debug!(attachment_id, path = %path.display(), "Recorded attachment path");
        Ok(())
    }
}
