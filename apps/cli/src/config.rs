//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/upsync/config.toml`
//! - Windows: `%APPDATA%/upsync/config.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use upsync_protocol::constants::DEFAULT_SERVICE_HOST;
use upsync_uploader::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsyncConfig {
    /// Primary hostname of the service.
    #[serde(default = "default_service_host")]
    pub service_host: String,

    /// OAuth token saved after authentication.
    #[serde(default)]
    pub oauth_token: String,

    /// Overrides the derived `https://upload.<host>` origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_base_url: Option<String>,

    /// Maximum number of simultaneous uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

fn default_service_host() -> String {
    DEFAULT_SERVICE_HOST.into()
}

impl Default for UpsyncConfig {
    fn default() -> Self {
        Self {
            service_host: default_service_host(),
            oauth_token: String::new(),
            upload_base_url: None,
            concurrency: None,
        }
    }
}

impl UpsyncConfig {
    /// Loads configuration from `path`, writing the defaults there if the
    /// file does not exist yet.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: UpsyncConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = UpsyncConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix (holds the OAuth token).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            service_host: self.service_host.clone(),
            upload_base_url: self.upload_base_url.clone().filter(|u| !u.trim().is_empty()),
            persisted_token: Some(self.oauth_token.clone()),
            ..Default::default()
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("upsync").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("upsync")
            .join("config.toml")
    }
}
