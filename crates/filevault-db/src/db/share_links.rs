use filevault_core::models::ShareLink;
use filevault_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::ShareLinkRepository;

#[derive(Clone)]
pub struct PostgresShareLinkRepository {
    pool: PgPool,
}

impl PostgresShareLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ShareLinkRepository for PostgresShareLinkRepository {
    #[tracing::instrument(skip(self, link), fields(db.table = "share_links", db.operation = "insert", db.record_id = %link.id))]
    async fn insert(&self, link: &ShareLink) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO share_links (id, file_id, token, expires_at, created_at, download_count)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(link.id)
        .bind(link.file_id)
        .bind(&link.token)
        .bind(link.expires_at)
        .bind(link.created_at)
        .bind(link.download_count)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, file_id = %link.file_id, "Failed to insert share link");
            AppError::from(e)
        })?;

        Ok(())
    }

    // Token is a bearer secret; keep it out of spans.
    #[tracing::instrument(skip(self, token), fields(db.table = "share_links", db.operation = "select"))]
    async fn get_by_token(&self, token: &str) -> Result<Option<ShareLink>, AppError> {
        let link = sqlx::query_as::<Postgres, ShareLink>(
            r#"
            SELECT id, file_id, token, expires_at, created_at, download_count
            FROM share_links
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_links", db.operation = "select"))]
    async fn list_for_file(&self, file_id: Uuid) -> Result<Vec<ShareLink>, AppError> {
        let links = sqlx::query_as::<Postgres, ShareLink>(
            r#"
            SELECT id, file_id, token, expires_at, created_at, download_count
            FROM share_links
            WHERE file_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_links", db.operation = "update", db.record_id = %id))]
    async fn increment_download_count(&self, id: Uuid) -> Result<i64, AppError> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE share_links SET download_count = download_count + 1
            WHERE id = $1
            RETURNING download_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        count.ok_or_else(|| AppError::NotFound(format!("share link {}", id)))
    }
}
