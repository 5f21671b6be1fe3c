//! HTTP adapters for downloads, uploads, and server URLs.

mod transport;
mod uploader;
mod url_resolver;

pub use transport::{ReqwestTransport, build_client};
pub use uploader::{DEFAULT_UPLOAD_FIELD, HttpUploader, parse_upload_response};
pub use url_resolver::{ServerUrlResolver, UPLOAD_PATH};
