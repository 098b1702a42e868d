//! Database repositories for data access layer
//!
//! Each repository is a trait so services can run against PostgreSQL in deployment and
//! against the in-memory implementation in tests.

pub mod files;
pub mod memory;
pub mod share_links;

use anyhow::Context;
use chrono::{DateTime, Utc};
use filevault_core::models::{FileObject, ShareLink};
use filevault_core::{AppError, DatabaseConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

pub use files::PostgresFileRepository;
pub use memory::{InMemoryDatabase, InMemoryFileRepository, InMemoryShareLinkRepository};
pub use share_links::PostgresShareLinkRepository;

/// File metadata operations
///
/// "Active" means not soft-deleted. Owner-scoped methods never return another owner's rows.
#[async_trait::async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, file: &FileObject) -> Result<(), AppError>;

    /// Fetch a file in any state, regardless of owner.
    async fn get(&self, id: Uuid) -> Result<Option<FileObject>, AppError>;

    async fn get_active_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FileObject>, AppError>;

    /// Newest first.
    async fn list_active_for_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileObject>, AppError>;

    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64, AppError>;

    /// Mark an active, owned file as deleted. Returns the updated row, or `None` if there was
    /// no such active file.
    async fn soft_delete(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError>;

    /// Clear `deleted_at` on a deleted, owned file. Returns the updated row, or `None` if
    /// there was no such deleted file.
    async fn restore(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError>;

    /// Soft-deleted files whose `deleted_at` is before `cutoff`, oldest first.
    async fn list_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileObject>, AppError>;

    /// Remove the row and, by cascade, its share links.
    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Share link operations
#[async_trait::async_trait]
pub trait ShareLinkRepository: Send + Sync {
    async fn insert(&self, link: &ShareLink) -> Result<(), AppError>;

    async fn get_by_token(&self, token: &str) -> Result<Option<ShareLink>, AppError>;

    /// Newest first.
    async fn list_for_file(&self, file_id: Uuid) -> Result<Vec<ShareLink>, AppError>;

    /// Atomically add one to `download_count` and return the new value.
    async fn increment_download_count(&self, id: Uuid) -> Result<i64, AppError>;
}

/// Open a connection pool using the configured URL and limits.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = config
        .url
        .as_deref()
        .context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.timeout_seconds))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.max_connections,
        "Database pool established"
    );

    Ok(pool)
}

/// Apply the bundled schema migrations.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(())
}
