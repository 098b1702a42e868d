use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Media types that get a derived thumbnail.
pub const IMAGE_MEDIA_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Stored file metadata.
///
/// `storage_key` is where the bytes live in the object store; `original_name` is only ever
/// used for display and `Content-Disposition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct FileObject {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_name: String,
    pub storage_key: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileObject {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_image(&self) -> bool {
        IMAGE_MEDIA_TYPES.contains(&self.media_type.as_str())
    }

    /// Size formatted for display, e.g. `"1.5 KB"`.
    pub fn human_readable_size(&self) -> String {
        let mut size = self.size_bytes as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{:.1} {}", size, unit);
            }
            size /= 1024.0;
        }
        format!("{:.1} TB", size)
    }
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        (self.page as i64) * (self.page_size as i64) < self.count
    }
}
