//! Message attachment loading use case.

use std::sync::Arc;

use tracing::debug;

use crate::application::dto::LoadedAttachment;
use crate::domain::entities::{AttachmentCategory, DecodeTarget, MessageAttachment};
use crate::domain::errors::{FetchError, FetchResult};
use crate::domain::ports::UrlResolver;
use crate::infrastructure::attachment::AttachmentFetcher;

/// Routes message attachments to the fetch operation for their kind.
pub struct LoadAttachmentUseCase {
    fetcher: AttachmentFetcher,
    urls: Arc<dyn UrlResolver>,
}

impl LoadAttachmentUseCase {
    /// Creates new use case.
    #[must_use]
    pub const fn new(fetcher: AttachmentFetcher, urls: Arc<dyn UrlResolver>) -> Self {
        Self { fetcher, urls }
    }

    /// Loads the preview of an attachment.
    ///
    /// Images and videos yield a thumbnail bounded by `bounds`. Contact
    /// cards and other files have no preview and are downloaded whole.
    ///
    /// # Errors
    /// Returns `NotFound` if the attachment has no usable URL, or the error
    /// of the underlying fetch.
    pub fn preview(
        &self,
        attachment: &MessageAttachment,
        bounds: DecodeTarget,
    ) -> FetchResult<LoadedAttachment> {
        let meta = &attachment.file_meta;
        let category = AttachmentCategory::from_content_type(&meta.content_type);
        debug!(message_key = %attachment.message_key, %category, "Loading attachment preview");

        match category {
            AttachmentCategory::Image => {
                let url = self
                    .urls
                    .thumbnail_url(meta)
                    .or_else(|| self.urls.download_url(meta))
                    .ok_or_else(|| missing_url(attachment))?;
                let reference = attachment.attachment_ref(url).thumbnail();
                self.fetcher
                    .fetch_thumbnail(
                        &reference,
                        bounds.requested_width,
                        bounds.requested_height,
                    )
                    .map(LoadedAttachment::Thumbnail)
            }
            AttachmentCategory::Video => {
                let server_url = self.urls.thumbnail_url(meta);
                if let Some(local) = &attachment.local_video_path {
                    return self
                        .fetcher
                        .fetch_or_generate_video_thumbnail(local, server_url.as_deref())
                        .map(LoadedAttachment::Thumbnail);
                }
                let url = server_url.ok_or_else(|| missing_url(attachment))?;
                let reference = attachment.attachment_ref(url).thumbnail();
                self.fetcher
                    .fetch_thumbnail(
                        &reference,
                        bounds.requested_width,
                        bounds.requested_height,
                    )
                    .map(LoadedAttachment::Thumbnail)
            }
            AttachmentCategory::Contact | AttachmentCategory::Other => {
                self.download(attachment).map(LoadedAttachment::File)
            }
        }
    }

    /// Downloads the full attachment and records it in the message store.
    ///
    /// # Errors
    /// Returns `NotFound` if the attachment has no download URL, or the
    /// error of the underlying fetch.
    pub fn download(&self, attachment: &MessageAttachment) -> FetchResult<std::path::PathBuf> {
        let url = self
            .urls
            .download_url(&attachment.file_meta)
            .ok_or_else(|| missing_url(attachment))?;
        let reference = attachment.attachment_ref(url);

        if reference.category() == AttachmentCategory::Contact {
            self.fetcher.fetch_contact_card(&reference)
        } else {
            self.fetcher.fetch_attachment(&reference)
        }
    }
}

fn missing_url(attachment: &MessageAttachment) -> FetchError {
    FetchError::NotFound(format!(
        "no URL for attachment of message {}",
        attachment.message_key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{FileMeta, ThumbnailSource};
    use crate::domain::ports::FallbackLayout;
    use crate::domain::ports::mocks::{
        MockFrameExtractor, MockMessageStore, MockTransport, MockUrlResolver, ScriptedResponse,
    };
    use crate::infrastructure::attachment::fixtures::{gradient_image, png_bytes};
    use crate::infrastructure::attachment::{PathResolver, VideoThumbnailGenerator};
    use crate::infrastructure::http::ServerUrlResolver;
    use crate::infrastructure::storage::DirectoryRoots;
    use tempfile::TempDir;

    const BASE: &str = "https://chat.example.com";

    fn fetcher(
        temp: &TempDir,
        transport: Arc<MockTransport>,
        store: MockMessageStore,
    ) -> AttachmentFetcher {
        let roots = DirectoryRoots::new(
            Some(temp.path().join("root")),
            temp.path().join("fallback"),
            FallbackLayout::Collapsed,
        );
        AttachmentFetcher::new(
            PathResolver::new(Arc::new(roots)),
            transport,
            Arc::new(store),
            VideoThumbnailGenerator::new(Arc::new(MockFrameExtractor::producing(32, 18))),
        )
    }

    fn attachment(name: &str, content_type: &str) -> MessageAttachment {
        MessageAttachment {
            message_key: "m-7".to_string(),
            created_at_epoch_ms: 1000,
            file_meta: FileMeta {
                blob_key: "blob7".to_string(),
                name: name.to_string(),
                content_type: content_type.to_string(),
                ..FileMeta::default()
            },
            local_video_path: None,
        }
    }

    #[test]
    fn test_image_preview_prefers_thumbnail_url() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "https://cdn.example.com/t/blob7",
            ScriptedResponse::ok(png_bytes(&gradient_image(400, 200))),
        );
        let mut message = attachment("pic.png", "image/png");
        message.file_meta.thumbnail_url = Some("https://cdn.example.com/t/blob7".to_string());

        let use_case = LoadAttachmentUseCase::new(
            fetcher(&temp, transport.clone(), MockMessageStore::new()),
            Arc::new(ServerUrlResolver::new(BASE)),
        );
        let target = DecodeTarget::new(100, 50);
        let loaded = use_case.preview(&message, target).unwrap();

        assert_eq!(loaded.path(), temp.path().join("root/image/.Thumbnail/pic1000.png"));
        match loaded {
            LoadedAttachment::Thumbnail(thumbnail) => {
                assert_eq!(thumbnail.source, ThumbnailSource::Network);
                let image = &thumbnail.image;
                assert_eq!((image.width(), image.height()), (100, 50));
            }
            LoadedAttachment::File(path) => panic!("unexpected file {}", path.display()),
        }
        assert_eq!(transport.connections(), 1);
    }

    #[test]
    fn test_local_video_without_server_thumbnail_is_generated() {
        let temp = TempDir::new().unwrap();
        let video_dir = temp.path().join("root/video");
        std::fs::create_dir_all(&video_dir).unwrap();
        let video = video_dir.join("clip1000.mp4");
        std::fs::write(&video, b"video").unwrap();
        let mut message = attachment("clip.mp4", "video/mp4");
        message.local_video_path = Some(video);

        let transport = Arc::new(MockTransport::new());
        let use_case = LoadAttachmentUseCase::new(
            fetcher(&temp, transport.clone(), MockMessageStore::new()),
            Arc::new(ServerUrlResolver::new(BASE)),
        );
        let target = DecodeTarget::original();
        let loaded = use_case.preview(&message, target).unwrap();

        assert_eq!(loaded.path(), video_dir.join(".Thumbnail/clip1000.jpeg"));
        assert_eq!(transport.connections(), 0);
    }

    #[test]
    fn test_remote_video_without_thumbnail_is_not_found() {
        let temp = TempDir::new().unwrap();
        let use_case = LoadAttachmentUseCase::new(
            fetcher(&temp, MockTransport::new().into(), MockMessageStore::new()),
            Arc::new(ServerUrlResolver::new(BASE)),
        );

        let err = use_case
            .preview(&attachment("clip.mp4", "video/mp4"), DecodeTarget::original())
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[test]
    fn test_contact_preview_downloads_card() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "https://chat.example.com/files/blob7",
            ScriptedResponse::ok(b"BEGIN:VCARD".to_vec()),
        );
        let mut store = MockMessageStore::new();
        store
            .expect_update_local_path()
            .times(1)
            .returning(|_, _| Ok(()));

        let use_case = LoadAttachmentUseCase::new(
            fetcher(&temp, transport, store),
            Arc::new(ServerUrlResolver::new(BASE)),
        );
        let loaded = use_case
            .preview(&attachment("card.vcf", "text/x-vcard"), DecodeTarget::original())
            .unwrap();

        assert!(matches!(loaded, LoadedAttachment::File(_)));
        assert_eq!(loaded.path(), temp.path().join("root/contact/card1000.vcf"));
    }

    #[test]
    fn test_missing_download_url_is_not_found() {
        let temp = TempDir::new().unwrap();
        let mut urls = MockUrlResolver::new();
        urls.expect_download_url().returning(|_| None);

        let use_case = LoadAttachmentUseCase::new(
            fetcher(&temp, MockTransport::new().into(), MockMessageStore::new()),
            Arc::new(urls),
        );
        let err = use_case
            .download(&attachment("report.pdf", "application/pdf"))
            .unwrap_err();

        assert!(matches!(err, FetchError::NotFound(_)));
        assert!(!temp.path().join("root/other/report1000.pdf").exists());
    }
}
