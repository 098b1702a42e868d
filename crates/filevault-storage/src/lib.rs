//! Filevault Storage Library
//!
//! Object storage abstraction and its two implementations, local filesystem and
//! S3-compatible object stores.
//!
//! # Storage key format
//!
//! Originals live at `files/{owner_id}/{uuid}{.ext}`; the derived thumbnail of an image
//! lives at the same path with the leading `files/` replaced by `thumbnails/`. Keys must not
//! contain `..` or a leading `/`. Key generation is centralized in the `keys` module so all
//! backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filevault_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    bytes_reader, collect_stream, ByteReader, ByteStream, DirectUrl, Storage, StorageError,
    StorageResult,
};
