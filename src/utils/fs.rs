//! File system helpers shared by the upgrade modules
//!
//! Everything that writes user-visible files goes through [`atomic_write`] or
//! [`atomic_write_executable`]: content lands in a uniquely named temporary
//! sibling first and is renamed over the target, so readers observe either
//! the old file or the new one.
//!
//! Hidden sibling names (`.<name>.<marker>-<uuid>`) are produced by
//! [`hidden_sibling`] and used for staging and backup directories.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::UpdateError;

/// Ensures a directory exists, creating it and its parents when needed.
///
/// # Errors
///
/// - [`UpdateError::FilesystemConflict`] if `path` exists but is not a directory
/// - An I/O error with context if creation fails
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(UpdateError::FilesystemConflict {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Writes `content` to `path` atomically.
///
/// The parent directory is created if missing. The temporary file is synced
/// before the rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    write_then_rename(path, content, false)
}

/// Same as [`atomic_write`], additionally marking the file executable on Unix.
pub fn atomic_write_executable(path: &Path, content: &[u8]) -> Result<()> {
    write_then_rename(path, content, true)
}

fn write_then_rename(path: &Path, content: &[u8], executable: bool) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = hidden_sibling(path, "tmp");

    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().context("Failed to sync file to disk")?;

        #[cfg(unix)]
        if executable {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o755))
                .with_context(|| format!("Failed to mark executable: {}", temp_path.display()))?;
        }
        #[cfg(not(unix))]
        let _ = executable;

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename temp file to: {}", path.display()))
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// Builds `<parent>/.<name>.<marker>-<uuid>` for `path`.
///
/// Every call returns a fresh name. Callers that need exclusivity must still
/// create the path with an operation that fails on collision.
pub fn hidden_sibling(path: &Path, marker: &str) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let sibling = format!(".{name}.{marker}-{}", uuid::Uuid::new_v4().simple());
    match path.parent() {
        Some(parent) => parent.join(sibling),
        None => PathBuf::from(sibling),
    }
}

/// Returns the modification time of a file or directory.
pub fn get_modified_time(path: &Path) -> Result<SystemTime> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    metadata
        .modified()
        .with_context(|| format!("Failed to read modification time: {}", path.display()))
}

/// Sets the modification time of a directory (or file) to now.
pub fn touch(path: &Path) -> Result<()> {
    set_modified(path, SystemTime::now())
}

/// Sets the modification time of a directory (or file) to `time`.
pub fn set_modified(path: &Path, time: SystemTime) -> Result<()> {
    let file = open_for_times(path)
        .with_context(|| format!("Failed to open for touch: {}", path.display()))?;
    file.set_modified(time)
        .with_context(|| format!("Failed to set modification time: {}", path.display()))
}

#[cfg(unix)]
fn open_for_times(path: &Path) -> std::io::Result<fs::File> {
    fs::File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> std::io::Result<fs::File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
}

/// Removes a directory tree if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove directory: {}", path.display()))
        }
    }
}
