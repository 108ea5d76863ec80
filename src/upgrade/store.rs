//! On-disk layout of installed versions.
//!
//! ```text
//! <root>/
//! ├── bin/<bin>            launcher shim (never collected)
//! ├── current -> ./3.2.0   active pointer, POSIX only (never collected)
//! ├── 3.1.0/               installed version
//! ├── 3.2.0/               installed version
//! └── .3.2.0.partial-*     transient staging directory
//! ```
//!
//! Every child of the root other than `bin` and `current` is a version
//! directory candidate for [`VersionStore::tidy`], including leftover hidden
//! staging and backup directories.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::constants::RESERVED_NAMES;
use crate::core::UpdateError;
use crate::upgrade::diagnostics::{CleanupStep, Diagnostics};
use crate::utils::fs::{ensure_dir, get_modified_time, remove_dir_all, touch};

/// Outcome of a [`VersionStore::tidy`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TidyReport {
    /// Entries that were deleted.
    pub removed: Vec<String>,
    /// Entries whose deletion failed, with the error.
    pub failed: Vec<(String, String)>,
    /// Entries kept because they are protected or still fresh.
    pub kept: Vec<String>,
}

/// Installed versions under a client root.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
    retention: Duration,
    diagnostics: Diagnostics,
}

impl VersionStore {
    pub fn new(root: impl Into<PathBuf>, retention: Duration, diagnostics: Diagnostics) -> Self {
        Self {
            root: root.into(),
            retention,
            diagnostics,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory.
    ///
    /// # Errors
    ///
    /// [`UpdateError::FilesystemConflict`](crate::core::UpdateError::FilesystemConflict)
    /// if the root exists and is not a directory.
    pub fn ensure_root(&self) -> Result<()> {
        ensure_dir(&self.root)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    /// Whether `version` is installed. Names that fail [`validate_version`]
    /// are never installed, even if an entry by that name exists.
    pub async fn has_version(&self, version: &str) -> bool {
        if validate_version(version).is_err() {
            return false;
        }
        tokio::fs::metadata(self.version_dir(version)).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Installed versions, oldest first.
    ///
    /// Reserved and hidden entries are excluded. Semver versions sort by
    /// precedence and come before non-semver names, which sort lexically.
    pub async fn installed_versions(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", self.root.display()));
            }
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", self.root.display()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || RESERVED_NAMES.contains(&name.as_str()) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                versions.push(name);
            }
        }

        sort_versions(&mut versions);
        Ok(versions)
    }

    /// Refresh a version directory's modification time.
    pub fn touch(&self, version: &str) -> Result<()> {
        touch(&self.version_dir(version))
    }

    /// Remove stale, unprotected entries under the root.
    ///
    /// Protection is decided by name only: `bin`, `current` and `protected`
    /// always survive. Every other entry whose modification time is older than
    /// the retention window is deleted. Deletions run concurrently and fail
    /// independently; failures are reported through [`Diagnostics`] and in the
    /// returned [`TidyReport`], never as an error.
    pub async fn tidy(&self, protected: &str) -> TidyReport {
        let mut report = TidyReport::default();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Client root {} does not exist, nothing to tidy", self.root.display());
                return report;
            }
            Err(e) => {
                self.record_listing_failure(e);
                return report;
            }
        };

        let now = SystemTime::now();
        let mut stale = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    self.record_listing_failure(e);
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if name == protected || RESERVED_NAMES.contains(&name.as_str()) {
                report.kept.push(name);
                continue;
            }

            let path = entry.path();
            if self.is_stale(&path, now) {
                stale.push((name, path));
            } else {
                report.kept.push(name);
            }
        }

        let deletions = stale.into_iter().map(|(name, path)| async move {
            let result = remove_entry(&path).await;
            (name, path, result)
        });

        for (name, path, result) in join_all(deletions).await {
            match &result {
                Ok(()) => {
                    info!("Removed stale version {name}");
                    report.removed.push(name);
                }
                Err(e) => report.failed.push((name, format!("{e:#}"))),
            }
            self.diagnostics.record(CleanupStep::TidyDelete, Some(&path), result);
        }

        report.removed.sort();
        report.kept.sort();
        report
    }

    fn record_listing_failure(&self, e: std::io::Error) {
        let listing = Err(e).with_context(|| format!("Failed to list {}", self.root.display()));
        self.diagnostics.record::<()>(CleanupStep::TidyDelete, Some(&self.root), listing);
    }

    fn is_stale(&self, path: &Path, now: SystemTime) -> bool {
        match get_modified_time(path) {
            Ok(modified) => modified
                .checked_add(self.retention)
                .is_some_and(|expires| expires <= now),
            Err(e) => {
                debug!("Keeping {}: {e:#}", path.display());
                false
            }
        }
    }
}

async fn remove_entry(path: &Path) -> Result<()> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    if metadata.is_dir() {
        remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("Failed to remove file: {}", path.display()))
    }
}

/// Check that `version` can be used as a version directory name.
///
/// A version is one path component made of ASCII letters, digits, `.`, `-`,
/// `+` and `_`. It may not start with `.` and may not be `bin` or `current`.
/// The same string is interpolated into the launcher shims, so nothing that
/// bash or cmd would expand is accepted.
pub fn validate_version(version: &str) -> std::result::Result<(), UpdateError> {
    let reject = |reason: &str| {
        Err(UpdateError::InvalidVersion {
            version: version.to_string(),
            reason: reason.to_string(),
        })
    };

    if version.is_empty() {
        return reject("empty version");
    }
    if RESERVED_NAMES.contains(&version) {
        return reject("reserved name under the client root");
    }
    if version.starts_with('.') {
        return reject("versions may not start with '.'");
    }
    if let Some(c) = version
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_')))
    {
        return reject(&format!("unexpected character {c:?}"));
    }
    Ok(())
}

/// Sort versions by semver precedence, non-semver names last in lexical order.
pub fn sort_versions(versions: &mut [String]) {
    versions.sort_by(|a, b| match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
}
