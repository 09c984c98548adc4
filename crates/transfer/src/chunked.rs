use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::TransferError;

/// A slice of a file read for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset just past the end of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Reads a file front to back in fixed-size chunks.
///
/// The file length is captured on open; a file that shrinks underneath the
/// reader yields an `UnexpectedEof` error instead of a short upload.
pub struct ChunkReader {
    file: tokio::fs::File,
    chunk_size: usize,
    offset: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "chunk size must be positive",
            )));
        }
        let file = tokio::fs::File::open(path).await?;
        let file_size = file.metadata().await?.len();
        debug!(path = %path.display(), file_size, chunk_size, "opened file for chunked read");
        Ok(Self {
            file,
            chunk_size,
            offset: 0,
            file_size,
        })
    }

    /// Seeks to the given byte offset (for resume).
    pub async fn seek_to(&mut self, offset: u64) -> Result<(), TransferError> {
        if offset > self.file_size {
            return Err(TransferError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("offset {offset} past end of file ({} bytes)", self.file_size),
            )));
        }
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.offset = offset;
        Ok(())
    }

    /// Reads the next chunk. Returns `None` at end of file.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let want = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(TransferError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("file truncated at byte {}", self.offset + filled as u64),
                )));
            }
            filled += n;
        }

        let chunk = Chunk {
            offset: self.offset,
            data: buf,
        };
        self.offset = chunk.end();
        Ok(Some(chunk))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// File size captured on open.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size - self.offset
    }
}
