//! Transport selection.
//!
//! Small files go up in one multipart request, large ones through the
//! resumable chunked protocol. [`select_strategy`] makes the call from the
//! byte length alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use upsync_protocol::RemoteRef;
use upsync_protocol::constants::DIRECT_UPLOAD_THRESHOLD;
use upsync_transfer::UploadFile;

use crate::chunked::ChunkedStrategy;
use crate::direct::DirectStrategy;
use crate::error::UploadError;
use crate::session::Session;

/// Which transport a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    Chunked,
}

/// Picks the transport for a file of `len` bytes.
pub fn select_strategy(len: u64) -> StrategyKind {
    if len < DIRECT_UPLOAD_THRESHOLD {
        StrategyKind::Direct
    } else {
        StrategyKind::Chunked
    }
}

/// A transport bound to one file.
pub enum Strategy {
    Direct(DirectStrategy),
    Chunked(ChunkedStrategy),
}

impl Strategy {
    /// Builds the strategy [`select_strategy`] picks for `file`.
    pub fn for_file(session: Arc<Session>, file: UploadFile, cancel: CancellationToken) -> Self {
        match select_strategy(file.size()) {
            StrategyKind::Direct => Self::Direct(DirectStrategy::new(session, file, cancel)),
            StrategyKind::Chunked => Self::Chunked(ChunkedStrategy::new(session, file, cancel)),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Direct(_) => StrategyKind::Direct,
            Self::Chunked(_) => StrategyKind::Chunked,
        }
    }

    /// Uploads the file as `name` into folder `parent_id`.
    pub async fn upload(
        &self,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        name: &str,
        parent_id: i64,
    ) -> Result<RemoteRef, UploadError> {
        match self {
            Self::Direct(s) => s
                .upload(on_progress, name, parent_id)
                .await
                .map(RemoteRef::Direct),
            Self::Chunked(s) => s
                .upload(on_progress, name, parent_id)
                .await
                .map(RemoteRef::Chunked),
        }
    }

    /// Cancels the in-flight upload, if any.
    pub fn abort(&self) {
        match self {
            Self::Direct(s) => s.abort(),
            Self::Chunked(s) => s.abort(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        match self {
            Self::Direct(s) => s.is_aborted(),
            Self::Chunked(s) => s.is_aborted(),
        }
    }
}
