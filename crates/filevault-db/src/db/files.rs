use chrono::{DateTime, Utc};
use filevault_core::models::FileObject;
use filevault_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::FileRepository;

const FILE_COLUMNS: &str = "id, owner_id, original_name, storage_key, media_type, size_bytes, \
                            created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PostgresFileRepository {
    pool: PgPool,
}

impl PostgresFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileRepository for PostgresFileRepository {
    #[tracing::instrument(skip(self, file), fields(db.table = "files", db.operation = "insert", db.record_id = %file.id))]
    async fn insert(&self, file: &FileObject) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, owner_id, original_name, storage_key, media_type, size_bytes,
                created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(file.id)
        .bind(file.owner_id)
        .bind(&file.original_name)
        .bind(&file.storage_key)
        .bind(&file.media_type)
        .bind(file.size_bytes)
        .bind(file.created_at)
        .bind(file.updated_at)
        .bind(file.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, storage_key = %file.storage_key, "Failed to insert file");
            AppError::from(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<FileObject>, AppError> {
        let query = format!("SELECT {} FROM files WHERE id = $1", FILE_COLUMNS);
        let file = sqlx::query_as::<Postgres, FileObject>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn get_active_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FileObject>, AppError> {
        let query = format!(
            "SELECT {} FROM files WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL",
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<Postgres, FileObject>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list_active_for_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileObject>, AppError> {
        let query = format!(
            r#"
            SELECT {} FROM files
            WHERE owner_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<Postgres, FileObject>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "count"))]
    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE owner_id = $1 AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn soft_delete(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError> {
        let query = format!(
            r#"
            UPDATE files SET deleted_at = $3, updated_at = $3
            WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<Postgres, FileObject>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn restore(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError> {
        let query = format!(
            r#"
            UPDATE files SET deleted_at = NULL, updated_at = $3
            WHERE id = $1 AND owner_id = $2 AND deleted_at IS NOT NULL
            RETURNING {}
            "#,
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<Postgres, FileObject>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileObject>, AppError> {
        let query = format!(
            r#"
            SELECT {} FROM files
            WHERE deleted_at IS NOT NULL AND deleted_at < $1
            ORDER BY deleted_at ASC
            LIMIT $2
            "#,
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<Postgres, FileObject>(&query)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = %id))]
    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
