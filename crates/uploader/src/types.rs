//! Data types for the upload flow.

use std::fmt;

use upsync_protocol::RemoteRef;

use crate::strategy::StrategyKind;

/// Identity of a task within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-file options accepted by [`UploadBatch::add`](crate::UploadBatch::add).
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Remote name; defaults to the local file name.
    pub name: Option<String>,
}

impl UploadOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Outcome of one successful task.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub task_id: TaskId,
    /// Name the file was uploaded under.
    pub name: String,
    pub kind: StrategyKind,
    pub remote: RemoteRef,
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No tasks yet.
    Empty,
    /// At least one task, not started.
    Ready,
    /// `start` is in progress.
    Running,
    /// `start` returned; the batch cannot be reused.
    Settled,
}
