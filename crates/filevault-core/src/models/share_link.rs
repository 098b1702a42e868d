use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Public, token-addressed access to a single file.
///
/// There is no status column: whether a link can still be used is derived from
/// `expires_at` and the file's soft-delete state every time it is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct ShareLink {
    pub id: Uuid,
    pub file_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub download_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareLinkState {
    Active,
    Expired,
    Revoked,
}

impl ShareLink {
    /// Expiry is checked first: an expired link on a deleted file reports `Expired`.
    pub fn state(&self, now: DateTime<Utc>, file_deleted: bool) -> ShareLinkState {
        if now > self.expires_at {
            ShareLinkState::Expired
        } else if file_deleted {
            ShareLinkState::Revoked
        } else {
            ShareLinkState::Active
        }
    }
}

/// A resolved duration choice, e.g. `24h` -> 86400 seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareDuration {
    pub label: String,
    pub duration: Duration,
}
