//! Use case implementations.

mod load_attachment_use_case;
mod upload_attachment_use_case;

pub use load_attachment_use_case::LoadAttachmentUseCase;
pub use upload_attachment_use_case::UploadAttachmentUseCase;
