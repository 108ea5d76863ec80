use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::constants::{BACKUP_MARKER, RESTORE_ATTEMPTS, RESTORE_RETRY_DELAY};
use crate::utils::fs::{hidden_sibling, remove_dir_all};

/// Parks an existing install directory while a replacement is committed.
///
/// The extractor moves the current destination aside with [`park`](Self::park)
/// before renaming the staged tree into place. If that rename fails the
/// original is put back with [`restore`](Self::restore); on success the parked
/// copy is discarded with [`cleanup`](Self::cleanup).
///
/// Backups live next to the destination as `.<name>.backup-<uuid>` so the move
/// is a same-filesystem rename and never copies data.
///
/// # Examples
///
/// ```rust,no_run
/// use cliup::upgrade::backup::BackupManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let backup = BackupManager::new(PathBuf::from("/data/client/3.2.0"));
/// let parked = backup.park().await?;
///
/// match tokio::fs::rename("/data/client/.staged", "/data/client/3.2.0").await {
///     Ok(()) => backup.cleanup().await?,
///     Err(_) if parked => backup.restore().await?,
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
pub struct BackupManager {
    original_path: PathBuf,
    backup_path: PathBuf,
}

impl BackupManager {
    pub fn new(original_path: PathBuf) -> Self {
        let backup_path = hidden_sibling(&original_path, BACKUP_MARKER);
        Self {
            original_path,
            backup_path,
        }
    }

    /// Move the original aside. Returns `false` when there was nothing to park.
    pub async fn park(&self) -> Result<bool> {
        if fs::symlink_metadata(&self.original_path).await.is_err() {
            return Ok(false);
        }

        debug!("Parking {} at {}", self.original_path.display(), self.backup_path.display());
        fs::rename(&self.original_path, &self.backup_path).await.with_context(|| {
            format!(
                "Failed to move {} to {}",
                self.original_path.display(),
                self.backup_path.display()
            )
        })?;
        Ok(true)
    }

    /// Put the parked directory back at the original path.
    ///
    /// Anything occupying the original path is removed first. Transient
    /// failures (a scanner holding a handle on Windows) are retried.
    pub async fn restore(&self) -> Result<()> {
        if !self.backup_exists() {
            bail!("No backup found at {}", self.backup_path.display());
        }

        warn!("Restoring {} from {}", self.original_path.display(), self.backup_path.display());

        let mut attempts = 0;
        loop {
            match self.attempt_restore().await {
                Ok(()) => {
                    info!("Restored {}", self.original_path.display());
                    return Ok(());
                }
                Err(e) if attempts + 1 < RESTORE_ATTEMPTS => {
                    warn!("Restore attempt {} failed: {e:#}. Retrying...", attempts + 1);
                    tokio::time::sleep(RESTORE_RETRY_DELAY).await;
                    attempts += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Failed to restore backup after {RESTORE_ATTEMPTS} attempts"
                    )));
                }
            }
        }
    }

    async fn attempt_restore(&self) -> Result<()> {
        remove_dir_all(&self.original_path).await?;
        fs::rename(&self.backup_path, &self.original_path)
            .await
            .with_context(|| format!("Failed to restore {}", self.original_path.display()))
    }

    /// Delete the parked directory.
    pub async fn cleanup(&self) -> Result<()> {
        if self.backup_exists() {
            debug!("Removing backup at {}", self.backup_path.display());
            remove_dir_all(&self.backup_path).await?;
        }
        Ok(())
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn install(root: &Path, version: &str, marker: &str) -> PathBuf {
        let dir = root.join(version);
        fs::create_dir_all(dir.join("bin")).await.unwrap();
        fs::write(dir.join("bin").join("tool"), marker).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_park_missing_returns_false() {
        let temp = TempDir::new().unwrap();
        let backup = BackupManager::new(temp.path().join("3.2.0"));

        assert!(!backup.park().await.unwrap());
        assert!(!backup.backup_exists());
    }

    #[tokio::test]
    async fn test_park_then_restore() {
        let temp = TempDir::new().unwrap();
        let dir = install(temp.path(), "3.2.0", "old").await;

        let backup = BackupManager::new(dir.clone());
        assert!(backup.park().await.unwrap());
        assert!(!dir.exists());
        assert!(backup.backup_exists());
        let name = backup.backup_path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".3.2.0.backup-"));

        // A half-written replacement occupies the destination
        fs::create_dir_all(dir.join("junk")).await.unwrap();

        backup.restore().await.unwrap();
        assert_eq!(fs::read_to_string(dir.join("bin").join("tool")).await.unwrap(), "old");
        assert!(!dir.join("junk").exists());
        assert!(!backup.backup_exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_backup() {
        let temp = TempDir::new().unwrap();
        let dir = install(temp.path(), "3.2.0", "old").await;

        let backup = BackupManager::new(dir);
        backup.park().await.unwrap();
        backup.cleanup().await.unwrap();
        assert!(!backup.backup_exists());
        backup.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_without_backup_fails() {
        let temp = TempDir::new().unwrap();
        let backup = BackupManager::new(temp.path().join("3.2.0"));
        assert!(backup.restore().await.is_err());
    }
}
