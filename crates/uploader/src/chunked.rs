//! Resumable uploads over the tus 1.0.0 protocol.
//!
//! An upload is created with a `POST` to the collection endpoint, which
//! answers with a per-upload `Location`. The file is then sent front to back
//! in `PATCH` requests, each carrying the offset it starts at. When an
//! attempt fails after creation, the location is kept and the next attempt
//! asks the server how far it got (`HEAD`) instead of starting over.

use std::sync::{Arc, Mutex};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue, LOCATION};
use reqwest::{StatusCode, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use upsync_protocol::constants::{
    CHUNK_SIZE, HEADER_REMOTE_FILE_CRC32, HEADER_REMOTE_FILE_ID, HEADER_TUS_RESUMABLE,
    HEADER_UPLOAD_LENGTH, HEADER_UPLOAD_METADATA, HEADER_UPLOAD_OFFSET, META_PARENT_ID,
    OFFSET_CONTENT_TYPE, TUS_VERSION,
};
use upsync_protocol::{ChunkedUpload, UploadMetadata};
use upsync_transfer::{ChunkReader, UploadFile, partial_percent, validate_display_name};

use crate::error::{TransportError, UploadError};
use crate::session::Session;

/// An upload the server already holds, and the file length it was created for.
#[derive(Debug, Clone)]
struct ResumePoint {
    location: String,
    length: u64,
}

/// What the server reports about the assembled file on the final `PATCH`.
#[derive(Debug, Default)]
struct RemoteFile {
    id: Option<i64>,
    crc32: Option<String>,
}

/// tus client bound to a single file.
pub struct ChunkedStrategy {
    session: Arc<Session>,
    file: UploadFile,
    cancel: CancellationToken,
    chunk_size: usize,
    resume: Mutex<Option<ResumePoint>>,
}

impl ChunkedStrategy {
    pub fn new(session: Arc<Session>, file: UploadFile, cancel: CancellationToken) -> Self {
        Self {
            session,
            file,
            cancel,
            chunk_size: CHUNK_SIZE,
            resume: Mutex::new(None),
        }
    }

    /// Continues an upload the server already knows about instead of
    /// creating a new one. `length` is the file size the upload was created
    /// for; if the file no longer has that size a new upload is started.
    pub fn with_location(self, location: impl Into<String>, length: u64) -> Self {
        *self.resume.lock().unwrap() = Some(ResumePoint {
            location: location.into(),
            length,
        });
        self
    }

    #[cfg(test)]
    pub(crate) fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Per-upload URL, once the server has created the upload.
    pub fn location(&self) -> Option<String> {
        self.resume.lock().unwrap().as_ref().map(|r| r.location.clone())
    }

    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Uploads the file as `name` into folder `parent_id`.
    ///
    /// Progress is reported once per acknowledged chunk and never decreases.
    /// Only the acknowledgement of the last byte reports `100.0`.
    pub async fn upload(
        &self,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        name: &str,
        parent_id: i64,
    ) -> Result<ChunkedUpload, UploadError> {
        validate_display_name(name)?;
        if self.cancel.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(file = %name, location = ?self.location(), "chunked upload aborted");
                Err(UploadError::Aborted)
            }
            result = self.run(on_progress, name, parent_id) => result,
        }
    }

    /// Discards the server-side upload. Does nothing if none was created.
    pub async fn terminate(&self) -> Result<(), UploadError> {
        let Some(location) = self.location() else {
            return Ok(());
        };
        let auth = self.session.authorization()?;

        let resp = self
            .session
            .http()
            .delete(&location)
            .header(HEADER_TUS_RESUMABLE, TUS_VERSION)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        expect_status(resp, StatusCode::NO_CONTENT).await?;

        debug!(location = %location, "chunked upload terminated");
        *self.resume.lock().unwrap() = None;
        Ok(())
    }

    async fn run(
        &self,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        name: &str,
        parent_id: i64,
    ) -> Result<ChunkedUpload, UploadError> {
        let auth = self.session.authorization()?;
        let endpoint = self.session.endpoints().chunked();
        let mut reader = ChunkReader::open(self.file.path(), self.chunk_size).await?;
        let total = reader.file_size();

        let location = match self.resume_offset(&auth, total).await {
            Some((location, offset)) => {
                debug!(location = %location, offset, total, "resuming chunked upload");
                reader.seek_to(offset).await?;
                location
            }
            None => {
                let location = self.create(&endpoint, &auth, name, parent_id, total).await?;
                *self.resume.lock().unwrap() = Some(ResumePoint {
                    location: location.clone(),
                    length: total,
                });
                location
            }
        };

        let mut last = 0.0_f64;
        let mut acknowledged = false;
        let mut remote = RemoteFile::default();
        while let Some(chunk) = reader.next_chunk().await? {
            let end = chunk.end();
            let reply = self.patch(&location, &auth, chunk.offset, chunk.data, end).await?;
            remote.id = reply.id.or(remote.id);
            remote.crc32 = reply.crc32.or(remote.crc32);
            debug!(file = %name, offset = end, total, "chunk acknowledged");

            last = last.max(partial_percent(end, total));
            acknowledged = true;
            on_progress(last);
        }
        // Empty files and already-complete resumes send no chunk.
        if !acknowledged {
            on_progress(100.0);
        }

        Ok(ChunkedUpload {
            name: self.file.name().to_string(),
            url: endpoint,
            location,
            file_id: remote.id,
            crc32: remote.crc32,
        })
    }

    /// Returns the location and offset to continue from, or `None` when a
    /// new upload has to be created.
    ///
    /// A resume point is dropped if the file changed size, the server
    /// cannot report the offset, or reports one past the end of the file.
    async fn resume_offset(&self, auth: &HeaderValue, total: u64) -> Option<(String, u64)> {
        let point = self.resume.lock().unwrap().clone()?;

        let usable = if point.length != total {
            warn!(location = %point.location, recorded = point.length, total, "file size changed, starting a new upload");
            None
        } else {
            match self.remote_offset(&point.location, auth).await {
                Ok((offset, Some(length))) if length != total => {
                    warn!(location = %point.location, length, total, offset, "server holds an upload of a different length");
                    None
                }
                Ok((offset, _)) if offset > total => {
                    warn!(location = %point.location, offset, total, "server offset past end of file");
                    None
                }
                Ok((offset, _)) => Some((point.location, offset)),
                Err(e) => {
                    warn!(location = %point.location, error = %e, "cannot query upload offset, starting a new upload");
                    None
                }
            }
        };

        if usable.is_none() {
            *self.resume.lock().unwrap() = None;
        }
        usable
    }

    /// Creates the upload and returns its absolute location.
    async fn create(
        &self,
        endpoint: &str,
        auth: &HeaderValue,
        name: &str,
        parent_id: i64,
        total: u64,
    ) -> Result<String, UploadError> {
        let mut metadata = UploadMetadata::with_defaults(name, self.file.mime_type());
        metadata.merge([(META_PARENT_ID, parent_id.to_string())]);

        let resp = self
            .session
            .http()
            .post(endpoint)
            .header(HEADER_TUS_RESUMABLE, TUS_VERSION)
            .header(HEADER_UPLOAD_LENGTH, total)
            .header(HEADER_UPLOAD_METADATA, metadata.encode())
            .header(AUTHORIZATION, auth.clone())
            .send()
            .await?;
        let resp = expect_status(resp, StatusCode::CREATED).await?;

        let raw = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| TransportError::Protocol("creation response has no Location".into()))?;
        let location = Url::parse(endpoint)
            .and_then(|base| base.join(raw))
            .map_err(|e| TransportError::Protocol(format!("bad Location {raw:?}: {e}")))?
            .to_string();

        debug!(file = %name, parent_id, total, location = %location, "chunked upload created");
        Ok(location)
    }

    /// Asks the server how many bytes it already holds, and the upload
    /// length if it reports one.
    async fn remote_offset(
        &self,
        location: &str,
        auth: &HeaderValue,
    ) -> Result<(u64, Option<u64>), UploadError> {
        let resp = self
            .session
            .http()
            .head(location)
            .header(HEADER_TUS_RESUMABLE, TUS_VERSION)
            .header(AUTHORIZATION, auth.clone())
            .send()
            .await?;
        let resp = expect_status(resp, StatusCode::OK).await?;

        let offset = header_u64(&resp, HEADER_UPLOAD_OFFSET).ok_or_else(|| {
            TransportError::Protocol("offset response has no Upload-Offset".into())
        })?;
        Ok((offset, header_u64(&resp, HEADER_UPLOAD_LENGTH)))
    }

    /// Sends one chunk.
    async fn patch(
        &self,
        location: &str,
        auth: &HeaderValue,
        offset: u64,
        data: Vec<u8>,
        end: u64,
    ) -> Result<RemoteFile, UploadError> {
        let resp = self
            .session
            .http()
            .patch(location)
            .header(HEADER_TUS_RESUMABLE, TUS_VERSION)
            .header(HEADER_UPLOAD_OFFSET, offset)
            .header(CONTENT_TYPE, OFFSET_CONTENT_TYPE)
            .header(AUTHORIZATION, auth.clone())
            .body(data)
            .send()
            .await?;
        let resp = expect_status(resp, StatusCode::NO_CONTENT).await?;

        if let Some(acked) = header_u64(&resp, HEADER_UPLOAD_OFFSET) {
            if acked != end {
                warn!(location = %location, expected = end, acked, "server offset mismatch");
                return Err(TransportError::Protocol(format!(
                    "server acknowledged offset {acked}, expected {end}"
                ))
                .into());
            }
        }

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(RemoteFile {
            id: header(HEADER_REMOTE_FILE_ID).and_then(|v| v.parse().ok()),
            crc32: header(HEADER_REMOTE_FILE_CRC32),
        })
    }
}

/// Passes `resp` through if it has the `expected` status. Otherwise the
/// body is read, best effort, into the error.
async fn expect_status(
    resp: reqwest::Response,
    expected: StatusCode,
) -> Result<reqwest::Response, UploadError> {
    if resp.status() == expected {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body }.into())
}

fn header_u64(resp: &reqwest::Response, name: &str) -> Option<u64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
