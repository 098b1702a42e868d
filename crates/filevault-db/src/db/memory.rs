//! In-process repositories.
//!
//! Both repositories share one state behind a `tokio::sync::RwLock`, so hard-deleting a file
//! drops its share links the way the foreign-key cascade does in PostgreSQL, and the download
//! counter is incremented under the write lock.

use chrono::{DateTime, Utc};
use filevault_core::models::{FileObject, ShareLink};
use filevault_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FileRepository, ShareLinkRepository};

#[derive(Default)]
struct State {
    files: HashMap<Uuid, FileObject>,
    share_links: HashMap<Uuid, ShareLink>,
    /// token -> link id, kept in step with `share_links`.
    link_tokens: HashMap<String, Uuid>,
}

/// Handle to a shared in-memory database.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<RwLock<State>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> InMemoryFileRepository {
        InMemoryFileRepository {
            state: self.state.clone(),
        }
    }

    pub fn share_links(&self) -> InMemoryShareLinkRepository {
        InMemoryShareLinkRepository {
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InMemoryFileRepository {
    state: Arc<RwLock<State>>,
}

#[derive(Clone)]
pub struct InMemoryShareLinkRepository {
    state: Arc<RwLock<State>>,
}

fn newest_first(a: &FileObject, b: &FileObject) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

#[async_trait::async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn insert(&self, file: &FileObject) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.files.contains_key(&file.id)
            || state
                .files
                .values()
                .any(|f| f.storage_key == file.storage_key)
        {
            return Err(AppError::Internal(format!(
                "duplicate file {} / {}",
                file.id, file.storage_key
            )));
        }
        state.files.insert(file.id, file.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileObject>, AppError> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn get_active_for_owner(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FileObject>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .files
            .get(&id)
            .filter(|f| f.owner_id == owner_id && !f.is_deleted())
            .cloned())
    }

    async fn list_active_for_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileObject>, AppError> {
        let state = self.state.read().await;
        let mut files: Vec<FileObject> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && !f.is_deleted())
            .cloned()
            .collect();
        files.sort_by(newest_first);
        Ok(files
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.read().await;
        Ok(state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && !f.is_deleted())
            .count() as i64)
    }

    async fn soft_delete(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .files
            .get_mut(&id)
            .filter(|f| f.owner_id == owner_id && !f.is_deleted())
            .map(|f| {
                f.deleted_at = Some(at);
                f.updated_at = at;
                f.clone()
            }))
    }

    async fn restore(
        &self,
        owner_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<FileObject>, AppError> {
        let mut state = self.state.write().await;
        Ok(state
            .files
            .get_mut(&id)
            .filter(|f| f.owner_id == owner_id && f.is_deleted())
            .map(|f| {
                f.deleted_at = None;
                f.updated_at = at;
                f.clone()
            }))
    }

    async fn list_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileObject>, AppError> {
        let state = self.state.read().await;
        let mut files: Vec<FileObject> = state
            .files
            .values()
            .filter(|f| f.deleted_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect();
        files.sort_by_key(|f| f.deleted_at);
        files.truncate(limit.max(0) as usize);
        Ok(files)
    }

    async fn hard_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let removed = state.files.remove(&id).is_some();
        if removed {
            let State {
                share_links,
                link_tokens,
                ..
            } = &mut *state;
            share_links.retain(|_, link| {
                let keep = link.file_id != id;
                if !keep {
                    link_tokens.remove(&link.token);
                }
                keep
            });
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ShareLinkRepository for InMemoryShareLinkRepository {
    async fn insert(&self, link: &ShareLink) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.files.contains_key(&link.file_id) {
            return Err(AppError::NotFound(format!("file {}", link.file_id)));
        }
        if state.link_tokens.contains_key(&link.token) || state.share_links.contains_key(&link.id)
        {
            return Err(AppError::Internal("duplicate share link".to_string()));
        }
        state.link_tokens.insert(link.token.clone(), link.id);
        state.share_links.insert(link.id, link.clone());
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ShareLink>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .link_tokens
            .get(token)
            .and_then(|id| state.share_links.get(id))
            .cloned())
    }

    async fn list_for_file(&self, file_id: Uuid) -> Result<Vec<ShareLink>, AppError> {
        let state = self.state.read().await;
        let mut links: Vec<ShareLink> = state
            .share_links
            .values()
            .filter(|l| l.file_id == file_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(links)
    }

    async fn increment_download_count(&self, id: Uuid) -> Result<i64, AppError> {
        let mut state = self.state.write().await;
        let link = state
            .share_links
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("share link {}", id)))?;
        link.download_count += 1;
        Ok(link.download_count)
    }
}
