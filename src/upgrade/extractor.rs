//! Atomic installation of a streamed tar archive.
//!
//! [`Extractor::extract`] turns an archive stream into a version directory
//! without ever exposing a half-written tree at the destination:
//!
//! 1. A hidden staging sibling `.<name>.partial-<uuid>` is created with
//!    `create_dir`, retrying with a fresh name on collision.
//! 2. The stream is unpacked into the staging directory on a blocking thread.
//!    The thread reads through a [`SyncIoBridge`] over a [`StreamReader`], so
//!    the network stream is only polled as fast as the disk writer consumes it.
//! 3. The archive's top-level `<inner_root>` directory is renamed onto the
//!    destination in one step. An existing destination is parked beforehand
//!    and restored if that rename fails.
//!
//! Any failure before the rename leaves the destination exactly as it was.
//!
//! # Accepted entries
//!
//! | Entry type | Handling |
//! |---|---|
//! | Directory, regular file | unpacked |
//! | Symlink | skipped |
//! | PAX global header | skipped (metadata only) |
//! | Anything else | [`UpdateError::UnsupportedEntry`] |

use anyhow::{Context, Result};
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures::Stream;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use tokio::io::AsyncRead;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, info};

use crate::constants::{STAGING_MARKER, STAGING_NAME_ATTEMPTS, STREAM_BUFFER_BYTES};
use crate::core::UpdateError;
use crate::upgrade::backup::BackupManager;
use crate::upgrade::diagnostics::{CleanupStep, Diagnostics};
use crate::utils::fs::{hidden_sibling, remove_dir_all, touch};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Installs archives atomically, reporting cleanup through [`Diagnostics`].
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    diagnostics: Diagnostics,
}

impl Extractor {
    pub const fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Install the `inner_root` directory of a streamed archive at `destination`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::UnsupportedEntry`] for hard links, devices, FIFOs and
    ///   other entry types that are neither files nor directories
    /// - [`UpdateError::ExtractionFailed`] for read errors, corrupt archives,
    ///   entries escaping the staging directory, a missing `inner_root`, or a
    ///   failed commit
    pub async fn extract<S, E>(&self, stream: S, inner_root: &str, destination: &Path) -> Result<()>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
        E: Into<std::io::Error>,
    {
        self.extract_reader(StreamReader::new(stream), inner_root, destination).await
    }

    /// Same as [`extract`](Self::extract) for an arbitrary async reader.
    pub async fn extract_reader<R>(
        &self,
        reader: R,
        inner_root: &str,
        destination: &Path,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let parent = destination
            .parent()
            .ok_or_else(|| {
                UpdateError::extraction(destination, "destination has no parent directory")
            })?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        let staging = self.create_staging(destination).await?;
        debug!("Extracting into {}", staging.path().display());

        let unpacked = unpack(reader, staging.path().to_path_buf(), destination).await;
        let committed = match unpacked {
            Ok(()) => self.commit(staging.path(), inner_root, destination).await,
            Err(e) => Err(e),
        };

        staging.remove(&self.diagnostics).await;

        if committed.is_ok() {
            let refreshed = touch(destination);
            self.diagnostics.record(CleanupStep::Touch, Some(destination), refreshed);
            info!("Installed {}", destination.display());
        }
        committed
    }

    async fn create_staging(&self, destination: &Path) -> Result<StagingDir> {
        for attempt in 1..=STAGING_NAME_ATTEMPTS {
            let candidate = hidden_sibling(destination, STAGING_MARKER);
            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => return Ok(StagingDir::new(candidate)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Staging name collision on attempt {attempt}: {}", candidate.display());
                }
                Err(e) => {
                    return Err(UpdateError::extraction(
                        destination,
                        format!("cannot create staging directory {}: {e}", candidate.display()),
                    )
                    .into());
                }
            }
        }

        Err(UpdateError::extraction(
            destination,
            format!("no free staging directory name after {STAGING_NAME_ATTEMPTS} attempts"),
        )
        .into())
    }

    async fn commit(&self, staging: &Path, inner_root: &str, destination: &Path) -> Result<()> {
        let source = staging.join(inner_root);
        let is_dir = tokio::fs::symlink_metadata(&source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(UpdateError::extraction(
                destination,
                format!("archive has no top-level directory '{inner_root}'"),
            )
            .into());
        }

        let backup = BackupManager::new(destination.to_path_buf());
        let parked = self
            .diagnostics
            .record(CleanupStep::ParkBackup, Some(destination), backup.park().await)
            .unwrap_or(false);

        if let Err(e) = tokio::fs::rename(&source, destination).await {
            let failure = UpdateError::extraction(
                destination,
                format!("cannot move staged tree into place: {e}"),
            );
            if parked {
                backup.restore().await.context(failure.to_string())?;
            }
            return Err(failure.into());
        }

        if parked {
            let removed = backup.cleanup().await;
            self.diagnostics.record(CleanupStep::RemoveBackup, Some(backup.backup_path()), removed);
        }
        Ok(())
    }
}

/// Staging directory that is removed on every exit path.
///
/// The normal path calls [`StagingDir::remove`] so the outcome reaches
/// [`Diagnostics`]; `Drop` is the fallback when the future is cancelled.
struct StagingDir {
    path: PathBuf,
    armed: bool,
}

impl StagingDir {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self, diagnostics: &Diagnostics) {
        self.armed = false;
        let removed = remove_dir_all(&self.path).await;
        diagnostics.record(CleanupStep::RemoveStaging, Some(&self.path), removed);
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

async fn unpack<R>(reader: R, staging: PathBuf, destination: &Path) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let bridge = SyncIoBridge::new(reader);
    let task = tokio::task::spawn_blocking(move || unpack_blocking(bridge, &staging));

    match task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.downcast_ref::<UpdateError>().is_some() => Err(e),
        Ok(Err(e)) => Err(UpdateError::extraction(destination, format!("{e:#}")).into()),
        Err(join) => {
            Err(UpdateError::extraction(destination, format!("unpack task failed: {join}")).into())
        }
    }
}

fn unpack_blocking<R: Read>(source: R, staging: &Path) -> Result<()> {
    let mut reader = BufReader::with_capacity(STREAM_BUFFER_BYTES, source);

    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        let n = reader.read(&mut magic[filled..]).context("Failed to read archive stream")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let body = std::io::Cursor::new(magic[..filled].to_vec()).chain(reader);
    let body: Box<dyn Read> = if filled == magic.len() && magic == GZIP_MAGIC {
        debug!("Archive is gzip-compressed");
        Box::new(GzDecoder::new(body))
    } else {
        Box::new(body)
    };

    let mut archive = Archive::new(body);
    for entry in archive.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Failed to read archive entry")?;
        let entry_type = entry.header().entry_type();
        let path = entry.path().context("Invalid entry path")?.display().to_string();

        match entry_type {
            EntryType::Directory | EntryType::Regular | EntryType::Continuous => {
                let inside = entry
                    .unpack_in(staging)
                    .with_context(|| format!("Failed to unpack '{path}'"))?;
                if !inside {
                    anyhow::bail!("entry '{path}' escapes the extraction directory");
                }
            }
            EntryType::Symlink => debug!("Skipping symlink entry '{path}'"),
            EntryType::XGlobalHeader => debug!("Skipping global header '{path}'"),
            other => {
                return Err(UpdateError::UnsupportedEntry {
                    path,
                    entry_type: format!("{other:?}"),
                }
                .into());
            }
        }
    }

    // Consume trailing padding so the producer sees the whole body read
    let mut rest = archive.into_inner();
    std::io::copy(&mut rest, &mut std::io::sink()).context("Failed to drain archive stream")?;
    Ok(())
}
