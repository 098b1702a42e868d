//! Storage orchestration
//!
//! Sits between the owner-facing services and the object store. Uploads are validated
//! before any backend call, the original is written through a size-capped reader, and a
//! thumbnail is derived for images on a best-effort basis. Metadata persistence is the
//! caller's job.

use filevault_core::models::FileObject;
use filevault_core::{AppError, Clock, ThumbnailConfig, UploadPolicy};
use filevault_processing::validator::normalize_content_type;
use filevault_processing::{sniff, ThumbnailDeriver, UploadValidator, SNIFF_LEN};
use filevault_storage::keys::{generate_storage_key, thumbnail_key};
use filevault_storage::{bytes_reader, ByteReader, ByteStream, DirectUrl, Storage};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// An upload as handed over by the transport layer.
pub struct UploadRequest {
    pub owner_id: Uuid,
    pub filename: String,
    pub content_type: String,
    /// Size announced by the client; checked before any byte is read.
    pub declared_size: u64,
    pub body: ByteReader,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("owner_id", &self.owner_id)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

pub struct StorageOrchestrator {
    storage: Arc<dyn Storage>,
    validator: UploadValidator,
    thumbnails: ThumbnailDeriver,
    clock: Arc<dyn Clock>,
}

impl StorageOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        upload: &UploadPolicy,
        thumbnail: ThumbnailConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            validator: UploadValidator::from_policy(upload),
            thumbnails: ThumbnailDeriver::new(thumbnail, upload.max_file_size_bytes),
            clock,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Validate and store an upload, returning the metadata to persist.
    ///
    /// Checks run in a fixed order and the first failure wins: declared size, declared type,
    /// then the type sniffed from the first bytes of the body. Nothing touches the backend
    /// until all three pass.
    #[tracing::instrument(skip(self, request), fields(owner_id = %request.owner_id, declared_size = request.declared_size))]
    pub async fn upload(&self, request: UploadRequest) -> Result<FileObject, AppError> {
        let UploadRequest {
            owner_id,
            filename,
            content_type,
            declared_size,
            mut body,
        } = request;

        self.validator.validate_size(declared_size)?;
        self.validator.validate_declared_type(&content_type)?;

        let mut prefix = Vec::with_capacity(SNIFF_LEN);
        (&mut body)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut prefix)
            .await
            .map_err(|e| AppError::IoFailure(format!("Failed to read upload: {}", e)))?;

        let detected = sniff(&prefix);
        self.validator
            .validate_sniffed_type(&content_type, detected)?;

        let media_type = normalize_content_type(&content_type);
        let storage_key = generate_storage_key(owner_id, &filename);
        let max = self.validator.max_file_size();

        // One byte past the limit is enough to tell an oversize body from an exact fit.
        let capped: ByteReader = Box::pin(Cursor::new(prefix).chain(body).take(max + 1));

        let written = self
            .storage
            .put(&storage_key, capped, &media_type, Some(declared_size))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %storage_key, "Failed to store upload");
                AppError::from(e)
            })?;

        if written > max {
            tracing::warn!(
                key = %storage_key,
                declared_size,
                max,
                "Upload body exceeded its declared size and the limit"
            );
            if let Err(e) = self.storage.delete(&storage_key).await {
                tracing::error!(error = %e, key = %storage_key, "Failed to remove oversize upload");
            }
            return Err(AppError::TooLarge { size: written, max });
        }

        self.store_thumbnail(&storage_key, &media_type).await;

        let now = self.clock.now();
        let file = FileObject {
            id: Uuid::new_v4(),
            owner_id,
            original_name: display_name(&filename),
            storage_key,
            media_type,
            size_bytes: written as i64,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        tracing::info!(
            file_id = %file.id,
            key = %file.storage_key,
            size_bytes = written,
            media_type = %file.media_type,
            "Upload stored"
        );

        Ok(file)
    }

    /// Best effort; failures are logged and leave the file without a thumbnail.
    async fn store_thumbnail(&self, storage_key: &str, media_type: &str) {
        if !ThumbnailDeriver::applies_to(media_type) {
            return;
        }
        let Some(thumb_key) = thumbnail_key(storage_key) else {
            return;
        };

        let stream = match self.storage.get_stream(storage_key).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, key = %storage_key, "Could not re-read original for thumbnail");
                return;
            }
        };

        let Some(thumbnail) = self.thumbnails.derive(stream, media_type).await else {
            return;
        };

        let size = thumbnail.len() as u64;
        if let Err(e) = self
            .storage
            .put(&thumb_key, bytes_reader(thumbnail), media_type, Some(size))
            .await
        {
            tracing::warn!(error = %e, key = %thumb_key, "Failed to store thumbnail");
        }
    }

    /// Stream a file's original bytes.
    pub async fn download(&self, file: &FileObject) -> Result<ByteStream, AppError> {
        self.storage
            .get_stream(&file.storage_key)
            .await
            .map_err(AppError::from)
    }

    /// Delete the original and its thumbnail.
    ///
    /// Both deletes are always attempted; the first failure is returned after the second
    /// has run.
    #[tracing::instrument(skip(self, file), fields(file_id = %file.id))]
    pub async fn delete(&self, file: &FileObject) -> Result<(), AppError> {
        let original = self.storage.delete(&file.storage_key).await;

        let thumbnail = match thumbnail_key(&file.storage_key) {
            Some(key) => self.storage.delete(&key).await,
            None => Ok(()),
        };

        if let Err(ref e) = thumbnail {
            tracing::warn!(error = %e, key = %file.storage_key, "Failed to delete thumbnail");
        }

        original?;
        thumbnail?;
        Ok(())
    }

    /// Whether a thumbnail object is present. A backend failure reads as "no thumbnail".
    pub async fn thumbnail_exists(&self, file: &FileObject) -> bool {
        let Some(key) = thumbnail_key(&file.storage_key) else {
            return false;
        };
        match self.storage.exists(&key).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Thumbnail existence check failed");
                false
            }
        }
    }

    pub async fn original_exists(&self, file: &FileObject) -> Result<bool, AppError> {
        Ok(self.storage.exists(&file.storage_key).await?)
    }

    pub async fn direct_url(&self, file: &FileObject, ttl: Duration) -> Result<DirectUrl, AppError> {
        Ok(self.storage.direct_url(&file.storage_key, ttl).await?)
    }

    pub async fn thumbnail_url(
        &self,
        file: &FileObject,
        ttl: Duration,
    ) -> Result<Option<DirectUrl>, AppError> {
        if !file.is_image() || !self.thumbnail_exists(file).await {
            return Ok(None);
        }
        let Some(key) = thumbnail_key(&file.storage_key) else {
            return Ok(None);
        };
        Ok(Some(self.storage.direct_url(&key, ttl).await?))
    }
}

/// Last path component of a client-supplied filename, for display only.
pub fn display_name(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        "unnamed".to_string()
    } else {
        name.to_string()
    }
}
