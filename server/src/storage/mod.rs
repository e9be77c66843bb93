//! Storage module
//!
//! Content-addressed storage for uploaded cover images.

pub mod blob_store;

pub use blob_store::{BlobStore, StoredBlob};
