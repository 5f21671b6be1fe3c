//! Attachment cache - fetch, cache, and decode chat attachments.
//!
//! This crate downloads message attachments at most once, decodes image
//! thumbnails in two passes over a single response body, generates local
//! video thumbnails, and never leaves partially written cache entries.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "attachment-cache";
