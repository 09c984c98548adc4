//! Authenticated upload context.
//!
//! A [`Session`] bundles the resolved endpoints, the token store and the
//! shared HTTP client. Strategies receive it explicitly through their
//! constructors; there is no process-wide token.

use std::sync::RwLock;

use reqwest::header::HeaderValue;
use tracing::debug;
use upsync_protocol::Endpoints;
use upsync_protocol::constants::{AUTH_SCHEME, DEFAULT_SERVICE_HOST};

use crate::error::UploadError;

/// Source of the authorization token.
///
/// A persisted token (loaded from disk) wins over the in-memory token set
/// after interactive authentication.
#[derive(Debug, Default)]
pub struct TokenStore {
    persisted: Option<String>,
    session: RwLock<Option<String>>,
}

impl TokenStore {
    pub fn new(persisted: Option<String>) -> Self {
        Self {
            persisted: persisted.filter(|t| !t.trim().is_empty()),
            session: RwLock::new(None),
        }
    }

    /// Sets the in-memory fallback token.
    pub fn set_session_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut s = self.session.write().unwrap();
        *s = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
    }

    pub fn clear_session_token(&self) {
        let mut s = self.session.write().unwrap();
        *s = None;
    }

    /// Returns the token to use: persisted first, then in-memory.
    pub fn token(&self) -> Option<String> {
        if let Some(t) = &self.persisted {
            return Some(t.clone());
        }
        self.session.read().unwrap().clone()
    }
}

/// Settings used to build a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Primary hostname of the service (`put.io`).
    pub service_host: String,
    /// Replaces the derived `https://upload.<host>` origin when set.
    pub upload_base_url: Option<String>,
    /// Token loaded from persistent storage.
    pub persisted_token: Option<String>,
    /// Honour `HTTP(S)_PROXY` environment variables.
    pub system_proxy: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_host: DEFAULT_SERVICE_HOST.to_string(),
            upload_base_url: None,
            persisted_token: None,
            system_proxy: true,
        }
    }
}

/// Endpoints, credentials and HTTP client shared by every upload.
pub struct Session {
    endpoints: Endpoints,
    tokens: TokenStore,
    http: reqwest::Client,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, UploadError> {
        let endpoints = match &config.upload_base_url {
            Some(url) => Endpoints::with_base_url(url)?,
            None => Endpoints::for_service(&config.service_host)?,
        };

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("upsync/", env!("CARGO_PKG_VERSION")));
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        debug!(origin = %endpoints.origin(), "upload session created");

        Ok(Self {
            endpoints,
            tokens: TokenStore::new(config.persisted_token),
            http,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Builds the `Authorization: token <value>` header value.
    pub(crate) fn authorization(&self) -> Result<HeaderValue, UploadError> {
        let token = self.tokens.token().ok_or(UploadError::MissingToken)?;
        let mut value = HeaderValue::from_str(&format!("{AUTH_SCHEME} {token}"))
            .map_err(|_| UploadError::InvalidToken)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_token_wins() {
        let store = TokenStore::new(Some("disk".into()));
        store.set_session_token("memory");
        assert_eq!(store.token().as_deref(), Some("disk"));
    }

    #[test]
    fn falls_back_to_session_token() {
        let store = TokenStore::new(None);
        assert!(store.token().is_none());
        store.set_session_token("memory");
        assert_eq!(store.token().as_deref(), Some("memory"));
        store.clear_session_token();
        assert!(store.token().is_none());
    }

    #[test]
    fn blank_tokens_are_ignored() {
        let store = TokenStore::new(Some("  ".into()));
        store.set_session_token("");
        assert!(store.token().is_none());
    }

    #[test]
    fn authorization_header_format() {
        let session = Session::new(SessionConfig {
            persisted_token: Some("abc123".into()),
            ..Default::default()
        })
        .unwrap();
        let value = session.authorization().unwrap();
        assert_eq!(value.to_str().unwrap(), "token abc123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn missing_token_is_an_error() {
        let session = Session::new(SessionConfig::default()).unwrap();
        assert!(matches!(
            session.authorization(),
            Err(UploadError::MissingToken)
        ));
    }

    #[test]
    fn control_characters_rejected() {
        let session = Session::new(SessionConfig::default()).unwrap();
        session.tokens().set_session_token("bad\ntoken");
        assert!(matches!(
            session.authorization(),
            Err(UploadError::InvalidToken)
        ));
    }

    #[test]
    fn endpoints_follow_config() {
        let session = Session::new(SessionConfig::default()).unwrap();
        assert_eq!(session.endpoints().origin(), "https://upload.put.io");

        let session = Session::new(SessionConfig {
            upload_base_url: Some("http://127.0.0.1:9000".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(session.endpoints().chunked(), "http://127.0.0.1:9000/files/");
    }

    #[test]
    fn invalid_host_rejected() {
        let result = Session::new(SessionConfig {
            service_host: "https://put.io".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(UploadError::Protocol(_))));
    }
}
