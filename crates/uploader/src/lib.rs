//! Client-side upload flow for the upsync service.
//!
//! Files are routed by size: anything under 4 MB goes up in a single
//! multipart request ([`DirectStrategy`]), larger files through the
//! resumable tus protocol ([`ChunkedStrategy`]). An [`UploadBatch`] runs
//! many [`UploadTask`]s concurrently, reports per-file progress and settles
//! on completion or on the first failure.
//!
//! Every network call goes through a [`Session`], which carries the
//! endpoints, the authorization token and the HTTP client.

pub mod batch;
pub mod chunked;
pub mod direct;
pub mod error;
pub mod session;
pub mod strategy;
pub mod task;
pub mod types;

#[cfg(test)]
mod mock_server;

// Re-export primary types for convenience.
pub use batch::UploadBatch;
pub use chunked::ChunkedStrategy;
pub use direct::DirectStrategy;
pub use error::{TransportError, UploadError};
pub use session::{Session, SessionConfig, TokenStore};
pub use strategy::{Strategy, StrategyKind, select_strategy};
pub use task::UploadTask;
pub use types::{BatchState, TaskId, UploadOptions, UploadResult};
pub use upsync_protocol::{RemoteRef, UploadStatus};
