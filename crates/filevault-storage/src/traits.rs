//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filevault_core::AppError;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O failure: {0}")]
    Io(String),

    #[error("Payload exceeds limit of {limit} bytes")]
    LimitExceeded { limit: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Backend failures collapse to two kinds at the service boundary: `NotFound` and `IoFailure`.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("object {}", key)),
            other => AppError::IoFailure(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Incoming payload. Consumed until EOF.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Outgoing payload. Chunks are produced only when polled; dropping the stream releases the
/// underlying file handle or HTTP body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// A URL that gives direct access to an object without going through the service.
///
/// Only S3-compatible stores can presign. The local backend hands out a static URL under its
/// public media prefix, which is only meaningful if something serves that directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectUrl {
    Presigned { url: String, expires_in: Duration },
    Public(String),
}

impl DirectUrl {
    pub fn url(&self) -> &str {
        match self {
            DirectUrl::Presigned { url, .. } => url,
            DirectUrl::Public(url) => url,
        }
    }

    pub fn is_presigned(&self) -> bool {
        matches!(self, DirectUrl::Presigned { .. })
    }
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait, so services never
/// branch on which backend is configured. Keys are produced by [`crate::keys`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store everything `reader` yields under `key` and return the number of bytes written.
    ///
    /// An object only becomes visible at `key` once the whole payload was written.
    async fn put(
        &self,
        key: &str,
        reader: ByteReader,
        content_type: &str,
        size_hint: Option<u64>,
    ) -> StorageResult<u64>;

    /// Stream an object. Fails with `NotFound` if the key does not exist.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists. A missing key is `Ok(false)`, never an error.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Direct-access URL for an object.
    async fn direct_url(&self, key: &str, ttl: Duration) -> StorageResult<DirectUrl>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Wrap an in-memory payload as a [`ByteReader`].
pub fn bytes_reader(data: impl Into<Bytes>) -> ByteReader {
    Box::pin(std::io::Cursor::new(data.into()))
}

/// Drain a stream into memory, failing with `LimitExceeded` once more than `limit` bytes
/// have been read.
pub async fn collect_stream(mut stream: ByteStream, limit: Option<u64>) -> StorageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(limit) = limit {
            if (buffer.len() + chunk.len()) as u64 > limit {
                return Err(StorageError::LimitExceeded { limit });
            }
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn stream_of(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        ))
    }

    #[tokio::test]
    async fn test_collect_stream_concatenates_chunks() {
        let collected = collect_stream(stream_of(vec![b"ab", b"", b"cd"]), None)
            .await
            .unwrap();
        assert_eq!(collected, b"abcd");
    }

    #[tokio::test]
    async fn test_collect_stream_enforces_limit() {
        let result = collect_stream(stream_of(vec![b"abc", b"def"]), Some(4)).await;
        assert!(matches!(result, Err(StorageError::LimitExceeded { limit: 4 })));

        let exact = collect_stream(stream_of(vec![b"ab", b"cd"]), Some(4)).await;
        assert_eq!(exact.unwrap(), b"abcd");
    }

    #[test]
    fn test_storage_error_maps_to_two_kinds() {
        let not_found: AppError = StorageError::NotFound("files/a/b.png".to_string()).into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let io: AppError = StorageError::Io("disk full".to_string()).into();
        assert!(matches!(io, AppError::IoFailure(_)));

        let invalid: AppError = StorageError::InvalidKey("../x".to_string()).into();
        assert!(matches!(invalid, AppError::IoFailure(_)));
    }

    #[test]
    fn test_direct_url_accessors() {
        let presigned = DirectUrl::Presigned {
            url: "https://s3/x?sig".to_string(),
            expires_in: Duration::from_secs(60),
        };
        assert!(presigned.is_presigned());
        assert_eq!(presigned.url(), "https://s3/x?sig");

        let public = DirectUrl::Public("/media/files/x".to_string());
        assert!(!public.is_presigned());
    }
}
