//! Share links
//!
//! A link is a random bearer token bound to one file and an expiry instant. Its state is
//! derived on every read: expired once `now > expires_at`, revoked while the file is
//! soft-deleted. Each successful public download bumps the link's counter through the
//! repository's atomic increment.

use base64::Engine;
use filevault_core::models::{FileObject, ShareLink, ShareLinkState};
use filevault_core::{AppError, Clock, ShareLinkPolicy};
use filevault_db::{FileRepository, ShareLinkRepository};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::files::Download;
use crate::storage::StorageOrchestrator;

/// Result of resolving a token: the download plus the link as it stands after counting.
pub struct SharedDownload {
    pub link: ShareLink,
    pub file: FileObject,
    pub download: Download,
}

impl fmt::Debug for SharedDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDownload")
            .field("link_id", &self.link.id)
            .field("file_id", &self.file.id)
            .field("download", &self.download)
            .finish()
    }
}

pub struct ShareLinkService {
    links: Arc<dyn ShareLinkRepository>,
    files: Arc<dyn FileRepository>,
    orchestrator: Arc<StorageOrchestrator>,
    policy: ShareLinkPolicy,
    clock: Arc<dyn Clock>,
}

impl ShareLinkService {
    pub fn new(
        links: Arc<dyn ShareLinkRepository>,
        files: Arc<dyn FileRepository>,
        orchestrator: Arc<StorageOrchestrator>,
        policy: ShareLinkPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            links,
            files,
            orchestrator,
            policy,
            clock,
        }
    }

    /// Mint a link for one of the owner's active files.
    ///
    /// `duration_choice` is one of the configured labels (`1h`, `24h`, `7d` by default); an
    /// unknown label falls back to the configured default.
    #[tracing::instrument(skip(self))]
    pub async fn issue(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        duration_choice: &str,
    ) -> Result<ShareLink, AppError> {
        let file = self
            .files
            .get_active_for_owner(owner_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;

        let duration = self.policy.resolve(duration_choice);
        let now = self.clock.now();

        let link = ShareLink {
            id: Uuid::new_v4(),
            file_id: file.id,
            token: generate_token(self.policy.token_bytes),
            expires_at: now + duration.duration,
            created_at: now,
            download_count: 0,
        };

        self.links.insert(&link).await?;

        tracing::info!(
            link_id = %link.id,
            file_id = %file.id,
            duration = %duration.label,
            expires_at = %link.expires_at,
            "Share link issued"
        );

        Ok(link)
    }

    /// Resolve a public token into a download.
    ///
    /// Unknown token → `NotFound`; past expiry → `Expired`; file soft-deleted, hard-deleted
    /// or its bytes missing → `FileGone`. The counter is only incremented once the stream
    /// has been opened.
    #[tracing::instrument(skip(self, token))]
    pub async fn resolve(&self, token: &str) -> Result<SharedDownload, AppError> {
        let link = self
            .links
            .get_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("share link".to_string()))?;

        let now = self.clock.now();
        if now > link.expires_at {
            tracing::debug!(link_id = %link.id, expires_at = %link.expires_at, "Share link expired");
            return Err(AppError::Expired);
        }

        let file = match self.files.get(link.file_id).await? {
            Some(file) if link.state(now, file.is_deleted()) == ShareLinkState::Active => file,
            _ => {
                return Err(AppError::FileGone(format!(
                    "file {} was deleted",
                    link.file_id
                )))
            }
        };

        let stream = match self.orchestrator.download(&file).await {
            Ok(stream) => stream,
            Err(AppError::NotFound(_)) => {
                tracing::warn!(link_id = %link.id, key = %file.storage_key, "Shared file has no stored object");
                return Err(AppError::FileGone(format!(
                    "contents of file {} are missing",
                    file.id
                )));
            }
            Err(e) => return Err(e),
        };

        let download_count = self.links.increment_download_count(link.id).await?;

        tracing::info!(link_id = %link.id, file_id = %file.id, download_count, "Shared download started");

        let download = Download::new(&file, stream);
        Ok(SharedDownload {
            link: ShareLink {
                download_count,
                ..link
            },
            file,
            download,
        })
    }

    /// Links of one of the owner's files (deleted or not) with their current state.
    pub async fn list_for_file(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
    ) -> Result<Vec<(ShareLink, ShareLinkState)>, AppError> {
        let file = self
            .files
            .get(file_id)
            .await?
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;

        let now = self.clock.now();
        let links = self.links.list_for_file(file.id).await?;
        Ok(links
            .into_iter()
            .map(|link| {
                let state = link.state(now, file.is_deleted());
                (link, state)
            })
            .collect())
    }
}

/// Random URL-safe token carrying `bytes * 8` bits of entropy.
pub fn generate_token(bytes: usize) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..bytes).map(|_| rng.random()).collect();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}
