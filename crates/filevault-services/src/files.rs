use filevault_core::models::{FileObject, Page};
use filevault_core::{AppError, Clock};
use filevault_db::FileRepository;
use filevault_storage::{ByteStream, DirectUrl};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::storage::{StorageOrchestrator, UploadRequest};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A download ready to be turned into a response.
pub struct Download {
    pub stream: ByteStream,
    pub content_type: String,
    pub content_length: u64,
    pub suggested_filename: String,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("suggested_filename", &self.suggested_filename)
            .finish_non_exhaustive()
    }
}

impl Download {
    pub(crate) fn new(file: &FileObject, stream: ByteStream) -> Self {
        Self {
            stream,
            content_type: file.media_type.clone(),
            content_length: file.size_bytes.max(0) as u64,
            suggested_filename: file.original_name.clone(),
        }
    }
}

/// Owner-facing file lifecycle
///
/// Every operation is scoped to the calling owner; another owner's file and a soft-deleted
/// file are both reported as `NotFound`.
pub struct FileService {
    orchestrator: Arc<StorageOrchestrator>,
    files: Arc<dyn FileRepository>,
    clock: Arc<dyn Clock>,
    purge_on_delete: bool,
    direct_url_ttl: Duration,
}

impl FileService {
    pub fn new(
        orchestrator: Arc<StorageOrchestrator>,
        files: Arc<dyn FileRepository>,
        clock: Arc<dyn Clock>,
        purge_on_delete: bool,
        direct_url_ttl: Duration,
    ) -> Self {
        Self {
            orchestrator,
            files,
            clock,
            purge_on_delete,
            direct_url_ttl,
        }
    }

    /// Store an upload and persist its metadata.
    ///
    /// If the metadata insert fails the stored objects are removed again, so a failed upload
    /// never leaves bytes behind that no row points to.
    pub async fn upload(&self, request: UploadRequest) -> Result<FileObject, AppError> {
        let file = self.orchestrator.upload(request).await?;

        if let Err(e) = self.files.insert(&file).await {
            tracing::error!(error = %e, file_id = %file.id, key = %file.storage_key, "Failed to persist upload, removing objects");
            if let Err(cleanup) = self.orchestrator.delete(&file).await {
                tracing::error!(error = %cleanup, key = %file.storage_key, "Failed to remove orphaned objects");
            }
            return Err(e);
        }

        Ok(file)
    }

    /// One page of the owner's files, newest first. Pages are 1-based.
    pub async fn list(
        &self,
        owner_id: Uuid,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Page<FileObject>, AppError> {
        let page = page.max(1);
        let page_size = page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = (page as i64 - 1) * page_size as i64;

        let count = self.files.count_active_for_owner(owner_id).await?;
        let results = self
            .files
            .list_active_for_owner(owner_id, page_size as i64, offset)
            .await?;

        Ok(Page {
            count,
            page,
            page_size,
            results,
        })
    }

    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<FileObject, AppError> {
        self.files
            .get_active_for_owner(owner_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {}", id)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn download(&self, owner_id: Uuid, id: Uuid) -> Result<Download, AppError> {
        let file = self.get(owner_id, id).await?;
        let stream = self.orchestrator.download(&file).await?;
        Ok(Download::new(&file, stream))
    }

    /// Soft-delete a file and, when purge-on-delete is enabled, remove its objects.
    ///
    /// A failed object removal is logged but does not undo the soft delete; the purge
    /// service removes leftovers later.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<FileObject, AppError> {
        let file = self
            .files
            .soft_delete(owner_id, id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {}", id)))?;

        if self.purge_on_delete {
            if let Err(e) = self.orchestrator.delete(&file).await {
                tracing::warn!(error = %e, file_id = %file.id, key = %file.storage_key, "Failed to purge objects of deleted file");
            }
        }

        tracing::info!(file_id = %file.id, purged = self.purge_on_delete, "File deleted");
        Ok(file)
    }

    /// Undo a soft delete. Refused with `FileGone` once the bytes have been purged.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self, owner_id: Uuid, id: Uuid) -> Result<FileObject, AppError> {
        let file = self
            .files
            .get(id)
            .await?
            .filter(|f| f.owner_id == owner_id && f.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("deleted file {}", id)))?;

        if !self.orchestrator.original_exists(&file).await? {
            return Err(AppError::FileGone(format!(
                "contents of file {} were purged",
                id
            )));
        }

        let restored = self
            .files
            .restore(owner_id, id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("deleted file {}", id)))?;

        tracing::info!(file_id = %restored.id, "File restored");
        Ok(restored)
    }

    pub async fn direct_url(&self, owner_id: Uuid, id: Uuid) -> Result<DirectUrl, AppError> {
        let file = self.get(owner_id, id).await?;
        self.orchestrator
            .direct_url(&file, self.direct_url_ttl)
            .await
    }

    pub async fn thumbnail_url(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DirectUrl>, AppError> {
        let file = self.get(owner_id, id).await?;
        self.orchestrator
            .thumbnail_url(&file, self.direct_url_ttl)
            .await
    }
}
