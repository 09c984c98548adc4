use std::path::{Path, PathBuf};

use crate::TransferError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A local file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    path: PathBuf,
    name: String,
    size: u64,
    mime_type: String,
}

impl UploadFile {
    /// Stats `path` and builds a handle for it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path.display().to_string()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::NotAFile(path.display().to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            mime_type: detect_content_type(&name).to_string(),
            name,
            size: metadata.len(),
        })
    }

    /// Builds a handle from already known attributes.
    pub fn from_parts(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as found on disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Guesses a MIME type from the file extension.
pub fn detect_content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("srt") => "application/x-subrip",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("torrent") => "application/x-bittorrent",
        Some("iso") => "application/x-iso9660-image",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("mp4" | "m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("webm") => "video/webm",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
