//! tus `Upload-Metadata` header codec.
//!
//! The header is a comma-separated list of `key base64(value)` pairs.
//! Keys keep their first insertion position; a later write to the same key
//! replaces the value in place.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::ProtocolError;
use crate::constants::{META_CALLBACK_URL, META_NAME, META_PARENT_ID, META_TYPE};

/// Ordered key/value metadata attached to a chunked upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    entries: Vec<(String, String)>,
}

impl UploadMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default metadata for a new upload.
    ///
    /// `parent_id` and `callback_url` start out empty; callers merge the
    /// real destination over them.
    pub fn with_defaults(name: &str, mime_type: &str) -> Self {
        let mut meta = Self::new();
        meta.set(META_NAME, name);
        meta.set(META_TYPE, mime_type);
        meta.set(META_PARENT_ID, "");
        meta.set(META_CALLBACK_URL, "");
        meta
    }

    /// Sets `key`, replacing any earlier value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Applies `overrides` on top of the current entries. Overrides always win.
    pub fn merge<I, K, V>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in overrides {
            self.set(key.as_ref(), value);
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the `Upload-Metadata` header value.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k} {}", STANDARD.encode(v.as_bytes()))
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses an `Upload-Metadata` header value.
    pub fn decode(header: &str) -> Result<Self, ProtocolError> {
        let mut meta = Self::new();
        for pair in header.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once(' ') {
                Some((k, v)) => {
                    let bytes = STANDARD
                        .decode(v.trim())
                        .map_err(|e| ProtocolError::Metadata(format!("{k}: {e}")))?;
                    let value = String::from_utf8(bytes)
                        .map_err(|e| ProtocolError::Metadata(format!("{k}: {e}")))?;
                    (k, value)
                }
                None => (pair, String::new()),
            };
            if key.is_empty() {
                return Err(ProtocolError::Metadata("empty key".into()));
            }
            meta.set(key, value);
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_empty_parent() {
        let meta = UploadMetadata::with_defaults("movie.mkv", "video/x-matroska");
        assert_eq!(meta.get(META_NAME), Some("movie.mkv"));
        assert_eq!(meta.get(META_TYPE), Some("video/x-matroska"));
        assert_eq!(meta.get(META_PARENT_ID), Some(""));
        assert_eq!(meta.get(META_CALLBACK_URL), Some(""));
    }

    #[test]
    fn merge_overrides_default_parent() {
        let mut meta = UploadMetadata::with_defaults("a.bin", "application/octet-stream");
        meta.merge([(META_PARENT_ID, "42")]);
        assert_eq!(meta.get(META_PARENT_ID), Some("42"));
        // Position of the key is kept.
        assert_eq!(meta.len(), 4);
        assert!(meta.encode().split(',').nth(2).unwrap().starts_with("parent_id "));
    }

    #[test]
    fn encode_uses_base64_values() {
        let mut meta = UploadMetadata::new();
        meta.set("name", "hello.txt");
        meta.set("parent_id", "0");
        assert_eq!(meta.encode(), "name aGVsbG8udHh0,parent_id MA==");
    }

    #[test]
    fn empty_values_encode_as_bare_keys() {
        let mut meta = UploadMetadata::new();
        meta.set("callback_url", "");
        assert_eq!(meta.encode(), "callback_url");
    }

    #[test]
    fn decode_reverses_encode() {
        let mut meta = UploadMetadata::with_defaults("ünïcode name.mp4", "video/mp4");
        meta.merge([(META_PARENT_ID, "7")]);
        let parsed = UploadMetadata::decode(&meta.encode()).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert!(UploadMetadata::decode("name !!!").is_err());
    }
}
