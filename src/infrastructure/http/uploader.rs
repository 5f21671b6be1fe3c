//! Multipart uploads of local attachments.

use std::path::Path;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::entities::FileMeta;
use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::Uploader;

use super::transport::classify;

/// Multipart field carrying the file.
pub const DEFAULT_UPLOAD_FIELD: &str = "files[]";

/// Posts files to the upload endpoint as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    upload_url: String,
    field_name: String,
}

impl HttpUploader {
    /// Creates an uploader posting to `upload_url` under `field_name`.
    #[must_use]
    pub fn new(
        client: Client,
        upload_url: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
            field_name: field_name.into(),
        }
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, path: &Path, content_type: &str) -> FetchResult<FileMeta> {
        if !path.is_file() {
            return Err(FetchError::NotFound(path.display().to_string()));
        }

        let part = Part::file(path)
            .map_err(|e| FetchError::io(path, e))?
            .mime_str(content_type)
            .map_err(|e| {
                FetchError::upload(format!("invalid content type '{content_type}': {e}"))
            })?;
        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .map_err(|e| {
                warn!(path = %path.display(), error = %e, "Upload request failed");
                classify(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::upload(format!("server returned HTTP {status}")));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::upload(format!("failed to read response: {e}")))?;
        let meta = parse_upload_response(&body)?;

        info!(
            path = %path.display(),
            blob_key = %meta.blob_key,
            size = meta.size,
            "Uploaded attachment"
        );
        Ok(meta)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrappedFileMeta {
    file_meta: FileMeta,
}

/// Parses the upload response, which is either a bare descriptor or one
/// wrapped in a `fileMeta` field.
///
/// # Errors
/// Returns `Upload` if the body is not a descriptor or lacks a blob key.
pub fn parse_upload_response(body: &str) -> FetchResult<FileMeta> {
    let meta = serde_json::from_str::<WrappedFileMeta>(body)
        .map(|wrapped| wrapped.file_meta)
        .or_else(|_| serde_json::from_str::<FileMeta>(body))
        .map_err(|e| FetchError::upload(format!("unreadable upload response: {e}")))?;

    if meta.blob_key.is_empty() {
        return Err(FetchError::upload("upload response has no blob key"));
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use crate::infrastructure::http::build_client;

    #[test]
    fn test_parse_bare_descriptor() {
        let meta = parse_upload_response(
            r#"{"blobKey":"AMIfv9","name":"a.png","contentType":"image/png","size":42}"#,
        )
        .unwrap();
        assert_eq!(meta.blob_key, "AMIfv9");
        assert_eq!(meta.size, 42);
    }

    #[test]
    fn test_parse_wrapped_descriptor() {
        let meta = parse_upload_response(
            r#"{"fileMeta":{"blobKey":"k1","name":"clip.mp4","contentType":"video/mp4","thumbnailUrl":"https://t/k1"}}"#,
        )
        .unwrap();
        assert_eq!(meta.blob_key, "k1");
        assert_eq!(meta.thumbnail_url.as_deref(), Some("https://t/k1"));
    }

    #[test]
    fn test_parse_rejects_missing_blob_key() {
        let err = parse_upload_response(r#"{"name":"a.png"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Upload { .. }));
        assert!(parse_upload_response("<html>").is_err());
    }

    #[test]
    fn test_upload_posts_multipart_and_parses_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while let Ok(n) = stream.read(&mut buf) {
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.windows(7).any(|w| w == b"PAYLOAD") && request.ends_with(b"--\r\n") {
                    break;
                }
            }
            let body = r#"{"blobKey":"k9","name":"note.txt","contentType":"text/plain","size":7}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("note.txt");
        std::fs::write(&file, b"PAYLOAD").unwrap();

        let timeout = Duration::from_secs(5);
        let client = build_client(timeout, timeout, "test").unwrap();
        let url = format!("http://{addr}/rest/ws/upload/file");
        let uploader = HttpUploader::new(client, url, "file");
        let meta = uploader.upload(&file, "text/plain").unwrap();

        let request = server.join().unwrap();
        assert_eq!(meta.blob_key, "k9");
        assert!(request.starts_with("POST /rest/ws/upload/file"));
        assert!(request.contains("name=\"file\"; filename=\"note.txt\""));
        let headers = request.to_ascii_lowercase();
        assert!(headers.contains("content-type: text/plain"));
    }

    #[test]
    fn test_upload_missing_file_is_not_found() {
        let timeout = Duration::from_secs(1);
        let client = build_client(timeout, timeout, "test").unwrap();
        let uploader = HttpUploader::new(client, "http://127.0.0.1:9/upload", DEFAULT_UPLOAD_FIELD);

        let err = uploader
            .upload(Path::new("/nonexistent/a.png"), "image/png")
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
