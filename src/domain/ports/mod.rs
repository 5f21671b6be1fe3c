//! Ports to the collaborators around the attachment cache.

mod frame_extractor_port;
mod message_store_port;
mod storage_root_port;
mod transport_port;
mod uploader_port;
mod url_resolver_port;

pub use frame_extractor_port::FrameExtractor;
pub use message_store_port::MessageStore;
pub use storage_root_port::{FallbackLayout, StorageRootProvider};
pub use transport_port::{HttpResponse, HttpTransport};
pub use uploader_port::Uploader;
pub use url_resolver_port::UrlResolver;

#[cfg(test)]
pub mod mocks {
    pub use super::frame_extractor_port::mock::MockFrameExtractor;
    pub use super::message_store_port::MockMessageStore;
    pub use super::transport_port::mock::{MockTransport, ScriptedResponse};
    pub use super::uploader_port::MockUploader;
    pub use super::url_resolver_port::MockUrlResolver;
}
