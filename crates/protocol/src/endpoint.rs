//! Upload endpoint resolution.
//!
//! Upload traffic goes to the service host with the `upload` subdomain
//! substituted in: `put.io` and `www.put.io` both become
//! `https://upload.put.io`.

use crate::ProtocolError;
use crate::constants::{CHUNKED_UPLOAD_PATH, DIRECT_UPLOAD_PATH, UPLOAD_SUBDOMAIN};

/// Resolved upload endpoints for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    origin: String,
}

impl Endpoints {
    /// Derives the endpoints from the service's primary hostname.
    pub fn for_service(host: &str) -> Result<Self, ProtocolError> {
        let host = host.trim().trim_end_matches('.');
        if host.is_empty() || host.contains("://") || host.contains('/') || host.contains(' ') {
            return Err(ProtocolError::InvalidHost(host.to_string()));
        }

        let bare = host.strip_prefix("www.").unwrap_or(host);
        if bare.is_empty() {
            return Err(ProtocolError::InvalidHost(host.to_string()));
        }

        Ok(Self {
            origin: format!("https://{UPLOAD_SUBDOMAIN}.{bare}"),
        })
    }

    /// Uses an explicit origin (`scheme://authority`) instead of deriving one.
    ///
    /// Meant for self-hosted deployments and local test servers.
    pub fn with_base_url(base_url: &str) -> Result<Self, ProtocolError> {
        let origin = base_url.trim().trim_end_matches('/');
        let Some((scheme, authority)) = origin.split_once("://") else {
            return Err(ProtocolError::InvalidBaseUrl(base_url.to_string()));
        };
        if !matches!(scheme, "http" | "https") || authority.is_empty() || authority.contains('/')
        {
            return Err(ProtocolError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            origin: origin.to_string(),
        })
    }

    /// Origin shared by both endpoints.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// URL of the single-request multipart endpoint.
    pub fn direct(&self) -> String {
        format!("{}{DIRECT_UPLOAD_PATH}", self.origin)
    }

    /// URL where chunked upload sessions are created.
    pub fn chunked(&self) -> String {
        format!("{}{CHUNKED_UPLOAD_PATH}", self.origin)
    }
}
