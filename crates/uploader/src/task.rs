use std::sync::RwLock;

use tracing::{debug, info, warn};
use upsync_protocol::UploadStatus;
use upsync_transfer::UploadFile;

use crate::error::UploadError;
use crate::strategy::{Strategy, StrategyKind};
use crate::types::{TaskId, UploadResult};

/// One file's upload within a batch.
///
/// Tasks are created by [`UploadBatch::add`](crate::UploadBatch::add) and
/// always carry a strategy.
pub struct UploadTask {
    id: TaskId,
    file: UploadFile,
    name: String,
    parent_id: i64,
    strategy: Strategy,
    status: RwLock<UploadStatus>,
}

impl UploadTask {
    pub(crate) fn new(
        id: TaskId,
        file: UploadFile,
        name: Option<String>,
        parent_id: i64,
        strategy: Strategy,
    ) -> Self {
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| file.name().to_string());
        Self {
            id,
            file,
            name,
            parent_id,
            strategy,
            status: RwLock::new(UploadStatus::Pending),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    /// Name the file is uploaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> i64 {
        self.parent_id
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn status(&self) -> UploadStatus {
        *self.status.read().unwrap()
    }

    /// Runs the upload. Progress reports carry the task so a shared callback
    /// can tell files apart.
    pub async fn upload<F>(&self, on_progress: &F) -> Result<UploadResult, UploadError>
    where
        F: Fn(&UploadTask, f64) + Send + Sync,
    {
        match self.status() {
            UploadStatus::Pending => {}
            UploadStatus::Aborted => return Err(UploadError::Aborted),
            _ => return Err(UploadError::NotPending(self.id)),
        }
        self.transition(UploadStatus::Uploading);
        debug!(task = %self.id, file = %self.name, kind = ?self.kind(), "upload started");

        let forward = |pct: f64| on_progress(self, pct);
        let result = self
            .strategy
            .upload(&forward, &self.name, self.parent_id)
            .await;

        match result {
            Ok(remote) => {
                self.transition(UploadStatus::Completed);
                info!(task = %self.id, file = %self.name, size = self.file.size(), "upload completed");
                Ok(UploadResult {
                    task_id: self.id,
                    name: self.name.clone(),
                    kind: self.kind(),
                    remote,
                })
            }
            Err(UploadError::Aborted) => {
                self.transition(UploadStatus::Aborted);
                Err(UploadError::Aborted)
            }
            Err(e) => {
                warn!(task = %self.id, file = %self.name, error = %e, "upload failed");
                self.transition(UploadStatus::Failed);
                Err(e)
            }
        }
    }

    /// Cancels the upload. A task that already finished keeps its status.
    pub fn abort(&self) {
        self.strategy.abort();
        if self.transition(UploadStatus::Aborted) {
            debug!(task = %self.id, file = %self.name, "upload aborted");
        }
    }

    /// Applies `next` if the lifecycle allows it.
    fn transition(&self, next: UploadStatus) -> bool {
        let mut status = self.status.write().unwrap();
        if status.can_transition_to(next) {
            *status = next;
            true
        } else {
            false
        }
    }
}
