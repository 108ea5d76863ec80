//! Global configuration for cliup.
//!
//! The configuration lives at `~/.cliup/config.toml` (`%LOCALAPPDATA%\cliup\config.toml`
//! on Windows). A missing file is not an error: every setting has a default.
//!
//! ```toml
//! [client]
//! bin = "my-tool"
//! data_dir = "/opt/my-tool/data"
//! updatable = true
//!
//! [release]
//! base_url = "https://releases.example.com/my-tool"
//! registry_url = "https://registry.npmjs.org"
//! package = "my-tool"
//!
//! [update]
//! retention_days = 42
//! ```
//!
//! # Environment Overrides
//!
//! - `CLIUP_DATA_DIR` - replaces `client.data_dir`
//! - `CLIUP_CACHE_DIR` - replaces `client.cache_dir`
//! - `CLIUP_BASE_URL` - replaces `release.base_url`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::client::{ClientConfig, ShimFlavor};
use crate::core::UpdateError;
use crate::upgrade::config::UpdateConfig;

/// Default release host; real deployments set `release.base_url`.
pub const DEFAULT_BASE_URL: &str = "https://example.invalid/cliup";

/// Default registry queried for dist-tags.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// `[client]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    /// Launcher name. Defaults to the crate name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,

    /// Running version. Defaults to the crate version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Defaults to `dirs::data_local_dir()/<bin>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Defaults to `dirs::cache_dir()/<bin>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Defaults to `<data_dir>/client`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Defaults to `cmd` on Windows and `posix` elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shim: Option<ShimFlavor>,

    /// Set to `false` when another package manager owns the install.
    #[serde(default = "default_true")]
    pub updatable: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            bin: None,
            version: None,
            data_dir: None,
            cache_dir: None,
            root: None,
            shim: None,
            updatable: true,
        }
    }
}

/// `[release]` table: where versions are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// Registry package name. Defaults to the launcher name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Timeout for metadata requests, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            registry_url: default_registry_url(),
            package: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub release: ReleaseSection,

    #[serde(default)]
    pub update: UpdateConfig,
}

impl GlobalConfig {
    /// Load from `path` when given, otherwise from [`GlobalConfig::default_path`].
    ///
    /// A missing file yields the defaults. `CLIUP_*` environment overrides are
    /// applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path),
            None => Self::default_path().ok(),
        };

        let config = match path {
            Some(path) if path.exists() => Self::load_from(&path).await?,
            _ => Self::default(),
        };

        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Load from a specific file, without environment overrides.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| UpdateError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(config)
    }

    /// Write the configuration as TOML.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            crate::utils::fs::atomic_write(&path, content.as_bytes())
        })
        .await
        .context("Config write task panicked")?
    }

    /// `~/.cliup/config.toml`, or `%LOCALAPPDATA%\cliup\config.toml` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("cliup")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".cliup")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Apply `CLIUP_*` overrides looked up through `lookup`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("CLIUP_DATA_DIR") {
            self.client.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty("CLIUP_CACHE_DIR") {
            self.client.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = non_empty("CLIUP_BASE_URL") {
            self.release.base_url = url;
        }
        self
    }

    /// Launcher name, defaulting to the crate name.
    pub fn bin(&self) -> &str {
        self.client.bin.as_deref().unwrap_or(env!("CARGO_PKG_NAME"))
    }

    /// Registry package name, defaulting to the launcher name.
    pub fn package(&self) -> &str {
        self.release.package.as_deref().unwrap_or_else(|| self.bin())
    }

    /// Build the immutable [`ClientConfig`] for the running client.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ConfigError`] when a directory was not configured
    /// and the platform default cannot be determined.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let bin = self.bin().to_string();
        let version =
            self.client.version.clone().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

        let data_dir = match &self.client.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .ok_or_else(|| UpdateError::ConfigError {
                    message: "Unable to determine local data directory; set client.data_dir".into(),
                })?
                .join(&bin),
        };
        let cache_dir = match &self.client.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .ok_or_else(|| UpdateError::ConfigError {
                    message: "Unable to determine cache directory; set client.cache_dir".into(),
                })?
                .join(&bin),
        };

        let mut config = ClientConfig::new(bin, version, data_dir, cache_dir)
            .with_updatable(self.client.updatable);
        if let Some(root) = &self.client.root {
            config = config.with_root(root.clone());
        }
        if let Some(flavor) = self.client.shim {
            config = config.with_shim_flavor(flavor);
        }
        Ok(config)
    }

    /// The `[update]` timing settings.
    pub fn update_config(&self) -> UpdateConfig {
        self.update.clone()
    }
}
