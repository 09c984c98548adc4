//! Single-request multipart upload for small files.

use std::sync::Arc;

use futures_util::TryStreamExt;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use upsync_protocol::DirectResponse;
use upsync_protocol::constants::{FORM_FILE, FORM_FILENAME, FORM_PARENT_ID};
use upsync_transfer::{PercentReporter, TransferError, UploadFile, percent, validate_display_name};

use crate::error::{TransportError, UploadError};
use crate::session::Session;

/// Uploads a whole file in one `multipart/form-data` POST.
pub struct DirectStrategy {
    session: Arc<Session>,
    file: UploadFile,
    cancel: CancellationToken,
}

impl DirectStrategy {
    pub fn new(session: Arc<Session>, file: UploadFile, cancel: CancellationToken) -> Self {
        Self {
            session,
            file,
            cancel,
        }
    }

    /// Cancels the in-flight request. A pending [`upload`](Self::upload)
    /// settles with [`UploadError::Aborted`].
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Streams the file to the direct upload endpoint.
    ///
    /// Progress follows the bytes handed to the socket and is capped below
    /// 100 until the server has answered; a successful upload always ends
    /// with exactly `100.0`.
    pub async fn upload(
        &self,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        name: &str,
        parent_id: i64,
    ) -> Result<DirectResponse, UploadError> {
        validate_display_name(name)?;
        if self.cancel.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        let auth = self.session.authorization()?;
        let size = self.file.size();
        let file = tokio::fs::File::open(self.file.path())
            .await
            .map_err(TransferError::from)?;

        // Byte counts flow out of the body stream through a channel so the
        // callback does not have to be 'static.
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel::<u64>();
        let mut sent = 0u64;
        let stream = ReaderStream::new(file).inspect_ok(move |bytes| {
            sent += bytes.len() as u64;
            let _ = sent_tx.send(sent);
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), size)
            .file_name(name.to_string())
            .mime_str(self.file.mime_type())?;
        let form = Form::new()
            .part(FORM_FILE, part)
            .text(FORM_FILENAME, name.to_string())
            .text(FORM_PARENT_ID, parent_id.to_string());

        let url = self.session.endpoints().direct();
        debug!(url = %url, file = %name, parent_id, size, "direct upload started");

        let request = self
            .session
            .http()
            .post(&url)
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send();
        tokio::pin!(request);

        let mut reporter = PercentReporter::new();
        let resp = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(file = %name, "direct upload aborted");
                    return Err(UploadError::Aborted);
                }
                Some(bytes) = sent_rx.recv() => {
                    if let Some(pct) = reporter.update(percent(bytes, size)) {
                        if pct < 100.0 {
                            on_progress(pct);
                        }
                    }
                }
                resp = &mut request => break resp?,
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(file = %name, status = status.as_u16(), "direct upload rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let body = resp.text().await?;

        on_progress(100.0);
        debug!(file = %name, status = status.as_u16(), "direct upload finished");

        Ok(DirectResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server::{MockResponse, MockServer, test_session};
    use std::sync::Mutex;
    use std::time::Duration;

    fn write_file(dir: &std::path::Path, name: &str, len: usize) -> UploadFile {
        let path = dir.join(name);
        std::fs::write(&path, vec![b'x'; len]).unwrap();
        UploadFile::from_parts(path, name, len as u64, "application/octet-stream")
    }

    #[tokio::test]
    async fn uploads_multipart_form() {
        let server =
            MockServer::start(|_| MockResponse::new(200).body(r#"{"status":"OK"}"#)).await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "notes.txt", 1024);

        let strategy =
            DirectStrategy::new(test_session(server.url()), file, CancellationToken::new());
        let resp = strategy.upload(&|_| {}, "renamed.txt", 42).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json().unwrap()["status"], "OK");

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        let req = &reqs[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/v2/files/upload");
        assert_eq!(req.header("authorization"), Some("token secret"));
        assert!(req.header("content-type").unwrap().starts_with("multipart/form-data"));
        assert!(req.body_contains(b"name=\"file\"; filename=\"renamed.txt\""));
        assert!(req.body_contains(b"name=\"filename\"\r\n\r\nrenamed.txt"));
        assert!(req.body_contains(b"name=\"parent_id\"\r\n\r\n42"));
        assert!(req.body_contains(&[b'x'; 1024]));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_100() {
        let server = MockServer::start(|_| MockResponse::new(200)).await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "two-megs.bin", 2_000_000);

        let seen = Mutex::new(Vec::new());
        let strategy =
            DirectStrategy::new(test_session(server.url()), file, CancellationToken::new());
        strategy
            .upload(&|p| seen.lock().unwrap().push(p), "two-megs.bin", 0)
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.last(), Some(&100.0));
        assert_eq!(seen.iter().filter(|p| **p == 100.0).count(), 1);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
    }

    #[tokio::test]
    async fn http_error_is_transport_error() {
        let server = MockServer::start(|_| MockResponse::new(500).body("boom")).await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.bin", 10);

        let seen = Mutex::new(Vec::new());
        let strategy =
            DirectStrategy::new(test_session(server.url()), file, CancellationToken::new());
        let err = strategy
            .upload(&|p| seen.lock().unwrap().push(p), "a.bin", 0)
            .await
            .unwrap_err();

        match err {
            UploadError::Transport(TransportError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!seen.into_inner().unwrap().contains(&100.0));
    }

    #[tokio::test]
    async fn truncated_success_body_is_transport_error() {
        let server = MockServer::start(|_| {
            MockResponse::new(200)
                .body(r#"{"status":"#)
                .content_length(64)
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.bin", 10);

        let seen = Mutex::new(Vec::new());
        let strategy =
            DirectStrategy::new(test_session(server.url()), file, CancellationToken::new());
        let err = strategy
            .upload(&|p| seen.lock().unwrap().push(p), "a.bin", 0)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Transport(TransportError::Http(_))));
        assert!(!seen.into_inner().unwrap().contains(&100.0));
    }

    #[tokio::test]
    async fn empty_name_rejected_before_network() {
        let server = MockServer::start(|_| MockResponse::new(200)).await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.bin", 10);

        let strategy =
            DirectStrategy::new(test_session(server.url()), file, CancellationToken::new());
        let err = strategy.upload(&|_| {}, "", 0).await.unwrap_err();
        assert!(matches!(err, UploadError::Transfer(TransferError::InvalidName(_))));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn abort_settles_with_aborted() {
        let server = MockServer::start(|_| {
            MockResponse::new(200).delay(Duration::from_secs(10))
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "slow.bin", 10);

        let cancel = CancellationToken::new();
        let strategy = DirectStrategy::new(test_session(server.url()), file, cancel.clone());

        let aborter = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(strategy.upload(&|_| {}, "slow.bin", 0), aborter);
        assert!(matches!(result, Err(UploadError::Aborted)));
        assert!(strategy.is_aborted());
    }

    #[tokio::test]
    async fn missing_token_fails_fast() {
        let server = MockServer::start(|_| MockResponse::new(200)).await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.bin", 10);

        let session = crate::mock_server::session_without_token(server.url());
        let strategy = DirectStrategy::new(session, file, CancellationToken::new());
        let err = strategy.upload(&|_| {}, "a.bin", 0).await.unwrap_err();
        assert!(matches!(err, UploadError::MissingToken));
        assert!(server.requests().is_empty());
    }
}
