//! File-side plumbing for uploads: opening files, reading them in fixed-size
//! chunks and turning byte counts into progress percentages.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{Chunk, ChunkReader};
pub use progress::{BatchProgress, PercentReporter, partial_percent, percent, round2};
pub use types::{UploadFile, detect_content_type};
pub use validation::validate_display_name;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),
}
