//! Concurrent upload of a set of files.
//!
//! All tasks run as futures on the caller's task; nothing is spawned. The
//! batch resolves with every result in insertion order, or with the first
//! error as soon as it happens. Tasks still in flight at that point are
//! dropped, which cancels their requests, and are marked aborted.

use std::num::NonZeroUsize;
use std::sync::Arc;

use futures_util::future::try_join_all;
use futures_util::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use upsync_transfer::UploadFile;

use crate::error::UploadError;
use crate::session::Session;
use crate::strategy::Strategy;
use crate::task::UploadTask;
use crate::types::{BatchState, TaskId, UploadOptions, UploadResult};

pub struct UploadBatch {
    session: Arc<Session>,
    tasks: Vec<UploadTask>,
    state: BatchState,
    next_id: u64,
    cancel: CancellationToken,
    concurrency: Option<NonZeroUsize>,
}

impl UploadBatch {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            tasks: Vec::new(),
            state: BatchState::Empty,
            next_id: 1,
            cancel: CancellationToken::new(),
            concurrency: None,
        }
    }

    /// Runs at most `limit` uploads at a time. Uncapped by default.
    pub fn with_concurrency_limit(mut self, limit: NonZeroUsize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    /// Queues `file` for upload into folder `parent_id`.
    ///
    /// Fails with [`UploadError::Aborted`] once the batch has been aborted.
    pub fn add(
        &mut self,
        file: UploadFile,
        parent_id: i64,
        options: UploadOptions,
    ) -> Result<&mut Self, UploadError> {
        self.ensure_not_started()?;
        if self.cancel.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        let id = TaskId(self.next_id);
        self.next_id += 1;
        let strategy = Strategy::for_file(
            Arc::clone(&self.session),
            file.clone(),
            self.cancel.child_token(),
        );
        let task = UploadTask::new(id, file, options.name, parent_id, strategy);
        debug!(task = %id, file = %task.name(), kind = ?task.kind(), parent_id, "task added");

        self.tasks.push(task);
        self.state = BatchState::Ready;
        Ok(self)
    }

    /// Aborts and removes the task with identity `id`.
    ///
    /// Returns `Ok(None)` if no such task exists.
    pub fn remove(&mut self, id: TaskId) -> Result<Option<UploadTask>, UploadError> {
        self.ensure_not_started()?;

        let Some(pos) = self.tasks.iter().position(|t| t.id() == id) else {
            return Ok(None);
        };
        let task = self.tasks.remove(pos);
        task.abort();
        debug!(task = %id, file = %task.name(), "task removed");

        if self.tasks.is_empty() {
            self.state = BatchState::Empty;
        }
        Ok(Some(task))
    }

    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&UploadTask> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Returns a handle that aborts the whole batch, usable while
    /// [`start`](Self::start) holds the batch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Aborts every task.
    pub fn abort(&self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }

    /// Uploads every task concurrently.
    ///
    /// `on_progress` is shared by all tasks and called with the reporting
    /// task and its percentage. A batch can only be started once.
    pub async fn start<F>(&mut self, on_progress: F) -> Result<Vec<UploadResult>, UploadError>
    where
        F: Fn(&UploadTask, f64) + Send + Sync,
    {
        self.ensure_not_started()?;
        self.state = BatchState::Running;
        info!(tasks = self.tasks.len(), limit = ?self.concurrency, "batch started");

        let on_progress = &on_progress;
        let uploads = self.tasks.iter().map(|task| task.upload(on_progress));
        let result = match self.concurrency {
            None => try_join_all(uploads).await,
            Some(limit) => stream::iter(uploads)
                .buffer_unordered(limit.get())
                .try_collect::<Vec<_>>()
                .await
                .map(|mut results| {
                    results.sort_by_key(|r| r.task_id);
                    results
                }),
        };
        self.state = BatchState::Settled;

        match result {
            Ok(results) => {
                info!(uploaded = results.len(), "batch completed");
                Ok(results)
            }
            Err(e) => {
                error!(error = %e, "batch failed");
                for task in &self.tasks {
                    if !task.status().is_terminal() {
                        task.abort();
                    }
                }
                Err(e)
            }
        }
    }

    fn ensure_not_started(&self) -> Result<(), UploadError> {
        match self.state {
            BatchState::Running | BatchState::Settled => Err(UploadError::BatchStarted),
            BatchState::Empty | BatchState::Ready => Ok(()),
        }
    }
}
