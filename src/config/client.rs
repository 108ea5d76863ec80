//! Immutable description of the running client.
//!
//! A [`ClientConfig`] is built once from the global configuration and handed
//! to the update engine. Activating another version never mutates it; the
//! orchestrator returns a fresh value from [`ClientConfig::with_version`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{BIN_DIR, CHANNEL_FILE, LAST_RUN_FILE};

/// Launcher script flavor written into `<root>/bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShimFlavor {
    /// Bash script plus a `current` symlink.
    Posix,
    /// Windows batch script (`<bin>.cmd`).
    Cmd,
}

impl ShimFlavor {
    /// The flavor matching the host platform.
    pub const fn native() -> Self {
        if cfg!(windows) {
            Self::Cmd
        } else {
            Self::Posix
        }
    }

    /// File name of the shim for `bin`.
    pub fn shim_file_name(self, bin: &str) -> String {
        match self {
            Self::Posix => bin.to_string(),
            Self::Cmd => format!("{bin}.cmd"),
        }
    }
}

/// Everything the update engine needs to know about the client it updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    bin: String,
    version: String,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    root: PathBuf,
    shim_flavor: ShimFlavor,
    updatable: bool,
}

impl ClientConfig {
    /// Creates a config whose client root is `<data_dir>/client`.
    pub fn new(
        bin: impl Into<String>,
        version: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.into();
        let root = data_dir.join(crate::constants::CLIENT_DIR);
        Self {
            bin: bin.into(),
            version: version.into(),
            data_dir,
            cache_dir: cache_dir.into(),
            root,
            shim_flavor: ShimFlavor::native(),
            updatable: true,
        }
    }

    /// Overrides the client root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Overrides the shim flavor.
    #[must_use]
    pub const fn with_shim_flavor(mut self, flavor: ShimFlavor) -> Self {
        self.shim_flavor = flavor;
        self
    }

    /// Marks the install as managed (or not) by this updater.
    #[must_use]
    pub const fn with_updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    /// A copy of this config describing `version` as the running version.
    #[must_use]
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory holding every installed version plus `bin` and `current`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn shim_flavor(&self) -> ShimFlavor {
        self.shim_flavor
    }

    /// `false` when another package manager owns the install.
    pub const fn updatable(&self) -> bool {
        self.updatable
    }

    /// Upper-cased binary name with `-` replaced by `_` (`my-tool` -> `MY_TOOL`).
    pub fn env_prefix(&self) -> String {
        self.bin.to_uppercase().replace('-', "_")
    }

    /// Path of the launcher shim for this client.
    pub fn shim_path(&self) -> PathBuf {
        self.root.join(BIN_DIR).join(self.shim_flavor.shim_file_name(&self.bin))
    }

    /// Path of the persisted channel file.
    pub fn channel_file(&self) -> PathBuf {
        self.data_dir.join(CHANNEL_FILE)
    }

    /// Path of the debounce marker.
    pub fn last_run_file(&self) -> PathBuf {
        self.cache_dir.join(LAST_RUN_FILE)
    }

    /// Contents of `<BIN>_UPDATE_INSTRUCTIONS`, if set and non-empty.
    pub fn update_instructions(&self) -> Option<String> {
        std::env::var(format!("{}_UPDATE_INSTRUCTIONS", self.env_prefix()))
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClientConfig {
        ClientConfig::new("my-tool", "3.1.0", "/data/my-tool", "/cache/my-tool")
            .with_shim_flavor(ShimFlavor::Posix)
    }

    #[test]
    fn test_default_layout() {
        let config = sample();
        assert_eq!(config.root(), Path::new("/data/my-tool/client"));
        assert_eq!(config.shim_path(), Path::new("/data/my-tool/client/bin/my-tool"));
        assert_eq!(config.channel_file(), Path::new("/data/my-tool/channel"));
        assert_eq!(config.last_run_file(), Path::new("/cache/my-tool/lastrun"));
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(sample().env_prefix(), "MY_TOOL");
    }

    #[test]
    fn test_with_version_leaves_original_untouched() {
        let config = sample();
        let next = config.with_version("3.2.0");
        assert_eq!(config.version(), "3.1.0");
        assert_eq!(next.version(), "3.2.0");
        assert_eq!(next.root(), config.root());
    }

    #[test]
    fn test_cmd_shim_name() {
        let config = sample().with_shim_flavor(ShimFlavor::Cmd);
        assert_eq!(config.shim_path(), Path::new("/data/my-tool/client/bin/my-tool.cmd"));
    }
}
