//! Shared plumbing for the `filevault` operator binary: tracing setup, service wiring and
//! file <-> stream helpers.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use filevault_core::{Clock, Config, SystemClock};
use filevault_db::{
    FileRepository, PostgresFileRepository, PostgresShareLinkRepository, ShareLinkRepository,
};
use filevault_processing::content_type_for_extension;
use filevault_services::{
    create_storage, ByteStream, FileService, PurgeService, ShareLinkService, Storage,
    StorageOrchestrator, UploadRequest,
};
use filevault_storage::keys::extension_of;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// The services one CLI invocation works with.
pub struct Services {
    pub files: FileService,
    pub shares: ShareLinkService,
    pub purge: PurgeService,
}

impl Services {
    /// Connect to PostgreSQL and the configured object store.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pool = filevault_db::connect(&config.database).await?;
        let storage = storage_from_config(config).await?;

        Ok(Self::from_parts(
            config,
            storage,
            Arc::new(PostgresFileRepository::new(pool.clone())),
            Arc::new(PostgresShareLinkRepository::new(pool)),
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        config: &Config,
        storage: Arc<dyn Storage>,
        files: Arc<dyn FileRepository>,
        links: Arc<dyn ShareLinkRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let orchestrator = Arc::new(StorageOrchestrator::new(
            storage,
            &config.upload,
            config.thumbnail.clone(),
            clock.clone(),
        ));

        Self {
            files: FileService::new(
                orchestrator.clone(),
                files.clone(),
                clock.clone(),
                config.purge_on_delete,
                config.direct_url_ttl(),
            ),
            shares: ShareLinkService::new(
                links,
                files.clone(),
                orchestrator.clone(),
                config.share.clone(),
                clock.clone(),
            ),
            purge: PurgeService::new(orchestrator, files, clock, config.purge_batch_size),
        }
    }
}

/// The configured storage backend.
pub async fn storage_from_config(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    create_storage(config)
        .await
        .context("Failed to initialize storage backend")
}

/// Content type implied by a path's extension, or `application/octet-stream`.
pub fn content_type_for_path(path: &Path) -> &'static str {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(extension_of)
        .and_then(|ext| content_type_for_extension(&ext))
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Build an upload from a local file. The declared size is the file's current length.
pub async fn upload_request_from_path(
    path: &Path,
    owner_id: Uuid,
    content_type: Option<String>,
) -> anyhow::Result<UploadRequest> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let metadata = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(UploadRequest {
        owner_id,
        filename,
        content_type: content_type.unwrap_or_else(|| content_type_for_path(path).to_string()),
        declared_size: metadata.len(),
        body: Box::pin(file),
    })
}

/// Drain a download stream into a local file, returning the number of bytes written.
pub async fn write_stream_to_path(mut stream: ByteStream, path: &Path) -> anyhow::Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read from storage")?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}
