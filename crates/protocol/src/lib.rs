//! Wire-level building blocks shared by the upsync crates.
//!
//! Nothing in here performs I/O: it names the endpoints, headers and form
//! fields the upload service expects, encodes tus `Upload-Metadata` and
//! defines the status/result types the uploader reports.

pub mod constants;
pub mod endpoint;
pub mod metadata;
pub mod types;

// Re-export primary types for convenience.
pub use endpoint::Endpoints;
pub use metadata::UploadMetadata;
pub use types::{ChunkedUpload, DirectResponse, RemoteRef, UploadStatus};

/// Errors produced by the protocol crate.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid service host: {0}")]
    InvalidHost(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("malformed upload metadata: {0}")]
    Metadata(String),
}
