//! Storage roots and message store adapters.

mod message_store;
mod roots;

pub use message_store::JsonMessageStore;
pub use roots::DirectoryRoots;
