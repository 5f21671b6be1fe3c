//! Server URL scheme for attachments.

use crate::domain::entities::FileMeta;
use crate::domain::ports::UrlResolver;

/// Path of the upload endpoint below the base URL.
pub const UPLOAD_PATH: &str = "/rest/ws/upload/file";

const FILES_PATH: &str = "/files/";

/// Resolves URLs against a configured server base URL.
///
/// Absolute URLs carried by a [`FileMeta`] win over derived ones.
#[derive(Debug, Clone)]
pub struct ServerUrlResolver {
    base_url: String,
}

impl ServerUrlResolver {
    /// Creates a resolver for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl UrlResolver for ServerUrlResolver {
    fn thumbnail_url(&self, meta: &FileMeta) -> Option<String> {
        meta.thumbnail_url.clone().filter(|url| !url.is_empty())
    }

    fn download_url(&self, meta: &FileMeta) -> Option<String> {
        if let Some(url) = meta.url.as_ref().filter(|url| !url.is_empty()) {
            return Some(url.clone());
        }
        if meta.blob_key.is_empty() {
            return None;
        }
        Some(format!("{}{FILES_PATH}{}", self.base_url, meta.blob_key))
    }

    fn upload_url(&self) -> String {
        format!("{}{UPLOAD_PATH}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> FileMeta {
        FileMeta {
            blob_key: "AMIfv9".to_string(),
            ..FileMeta::default()
        }
    }

    #[test]
    fn test_download_url_derived_from_blob_key() {
        let resolver = ServerUrlResolver::new("https://chat.example.com/");
        assert_eq!(
            resolver.download_url(&meta()).as_deref(),
            Some("https://chat.example.com/files/AMIfv9")
        );
        assert_eq!(
            resolver.upload_url(),
            "https://chat.example.com/rest/ws/upload/file"
        );
    }

    #[test]
    fn test_explicit_urls_win() {
        let resolver = ServerUrlResolver::new("https://chat.example.com");
        let meta = FileMeta {
            url: Some("https://cdn.example.com/a".to_string()),
            thumbnail_url: Some("https://cdn.example.com/t".to_string()),
            ..meta()
        };
        assert_eq!(resolver.download_url(&meta).as_deref(), Some("https://cdn.example.com/a"));
        assert_eq!(resolver.thumbnail_url(&meta).as_deref(), Some("https://cdn.example.com/t"));
    }

    #[test]
    fn test_missing_thumbnail_and_key() {
        let resolver = ServerUrlResolver::new("https://chat.example.com");
        let empty = FileMeta::default();
        assert!(resolver.thumbnail_url(&empty).is_none());
        assert!(resolver.download_url(&empty).is_none());
    }
}
