//! Upload error types.

use crate::types::TaskId;

/// Network or HTTP-level failure reported by either strategy.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Errors produced by tasks, strategies and batches.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("transfer error: {0}")]
    Transfer(#[from] upsync_transfer::TransferError),

    #[error("protocol error: {0}")]
    Protocol(#[from] upsync_protocol::ProtocolError),

    #[error("no authorization token available")]
    MissingToken,

    #[error("authorization token is not a valid header value")]
    InvalidToken,

    #[error("upload aborted")]
    Aborted,

    #[error("batch already started")]
    BatchStarted,

    #[error("task {0} is not pending")]
    NotPending(TaskId),
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(e))
    }
}
