use serde::{Deserialize, Serialize};

/// Lifecycle of a single file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "aborted")]
    Aborted,
}

impl UploadStatus {
    /// Returns `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Pending, Aborted)
                | (Uploading, Completed)
                | (Uploading, Failed)
                | (Uploading, Aborted)
        )
    }
}

/// Raw response of a single-request upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectResponse {
    pub status: u16,
    pub body: String,
}

impl DirectResponse {
    /// Parses the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Remote resource created by a chunked upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedUpload {
    /// File name of the uploaded file.
    pub name: String,
    /// Endpoint the upload session was created at.
    pub url: String,
    /// Per-upload URL returned in `Location`.
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    /// CRC32 of the assembled file as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc32: Option<String>,
}

/// What the server handed back for a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteRef {
    Direct(DirectResponse),
    Chunked(ChunkedUpload),
}
