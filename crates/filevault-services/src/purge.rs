use chrono::Duration;
use filevault_core::{AppError, Clock};
use filevault_db::FileRepository;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::storage::StorageOrchestrator;

/// Outcome of one purge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Files whose objects and row were removed.
    pub purged: usize,
    /// Files left in place because a step failed; retried on the next run.
    pub failed: usize,
}

/// Hard purge of soft-deleted files
///
/// Runs on demand (CLI, cron). Files that were soft-deleted longer than the retention
/// window ago lose their objects and then their row; share links go with the row.
#[derive(Clone)]
pub struct PurgeService {
    orchestrator: Arc<StorageOrchestrator>,
    files: Arc<dyn FileRepository>,
    clock: Arc<dyn Clock>,
    batch_size: i64,
}

impl PurgeService {
    pub fn new(
        orchestrator: Arc<StorageOrchestrator>,
        files: Arc<dyn FileRepository>,
        clock: Arc<dyn Clock>,
        batch_size: i64,
    ) -> Self {
        Self {
            orchestrator,
            files,
            clock,
            batch_size: batch_size.max(1),
        }
    }

    /// Purge every file soft-deleted before `now - older_than`.
    ///
    /// Per-file failures are logged and counted, never fatal. Only a failure to list
    /// candidates aborts the run.
    #[tracing::instrument(skip(self), fields(purge.older_than_secs = older_than.num_seconds()))]
    pub async fn purge_deleted(&self, older_than: Duration) -> Result<PurgeReport, AppError> {
        let cutoff = self.clock.now() - older_than;
        let mut report = PurgeReport::default();
        // Failed rows stay in the listing; they are skipped for the rest of this run.
        let mut failed_ids: HashSet<Uuid> = HashSet::new();

        loop {
            let limit = self.batch_size + failed_ids.len() as i64;
            let listed = self.files.list_deleted_before(cutoff, limit).await?;
            let exhausted = (listed.len() as i64) < limit;

            let batch: Vec<_> = listed
                .into_iter()
                .filter(|file| !failed_ids.contains(&file.id))
                .collect();
            if batch.is_empty() {
                break;
            }

            for file in batch {
                tracing::info!(
                    file_id = %file.id,
                    key = %file.storage_key,
                    deleted_at = ?file.deleted_at,
                    "Purging deleted file"
                );

                if let Err(e) = self.orchestrator.delete(&file).await {
                    tracing::error!(
                        error = %e,
                        key = %file.storage_key,
                        "Failed to delete objects, keeping row for the next run"
                    );
                    failed_ids.insert(file.id);
                    continue;
                }

                match self.files.hard_delete(file.id).await {
                    Ok(_) => report.purged += 1,
                    Err(e) => {
                        tracing::error!(error = %e, file_id = %file.id, "Failed to delete file row");
                        failed_ids.insert(file.id);
                    }
                }
            }

            if exhausted {
                break;
            }
        }

        report.failed = failed_ids.len();

        tracing::info!(
            purged = report.purged,
            failed = report.failed,
            "Purge completed"
        );

        Ok(report)
    }
}
