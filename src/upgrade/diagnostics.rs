//! Reporting channel for best-effort cleanup.
//!
//! Steps such as removing a staging directory, touching a version directory or
//! deleting a stale install must never fail an otherwise successful update.
//! Instead of being ignored, their results are handed to
//! [`Diagnostics::record`], which logs failures as warnings and keeps every
//! outcome for the caller to inspect.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// The cleanup step an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    /// Removing the extractor's staging directory.
    RemoveStaging,
    /// Parking an existing destination before commit.
    ParkBackup,
    /// Removing a parked destination after commit.
    RemoveBackup,
    /// Refreshing a version directory's modification time.
    Touch,
    /// Deleting a stale version directory.
    TidyDelete,
    /// Querying the registry for dist-tags.
    ResolveChannel,
    /// Writing the followed channel after an install.
    PersistChannel,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RemoveStaging => "remove staging directory",
            Self::ParkBackup => "park existing install",
            Self::RemoveBackup => "remove backup",
            Self::Touch => "touch version directory",
            Self::TidyDelete => "delete stale version",
            Self::ResolveChannel => "resolve channel",
            Self::PersistChannel => "persist channel",
        };
        f.write_str(name)
    }
}

/// One recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupEvent {
    pub step: CleanupStep,
    pub path: Option<PathBuf>,
    /// `None` on success, the rendered error chain on failure.
    pub error: Option<String>,
}

impl CleanupEvent {
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Shared, cloneable sink for cleanup outcomes.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    events: Arc<Mutex<Vec<CleanupEvent>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a best-effort step and swallow its error.
    ///
    /// Returns the success value, or `None` if the step failed.
    pub fn record<T>(
        &self,
        step: CleanupStep,
        path: Option<&Path>,
        result: anyhow::Result<T>,
    ) -> Option<T> {
        self.push(step, path, result, true)
    }

    /// Like [`record`](Self::record), but a failure is only logged at debug.
    pub fn record_quiet<T>(
        &self,
        step: CleanupStep,
        path: Option<&Path>,
        result: anyhow::Result<T>,
    ) -> Option<T> {
        self.push(step, path, result, false)
    }

    fn push<T>(
        &self,
        step: CleanupStep,
        path: Option<&Path>,
        result: anyhow::Result<T>,
        loud: bool,
    ) -> Option<T> {
        let (value, error) = match result {
            Ok(value) => {
                debug!("{step} succeeded{}", describe(path));
                (Some(value), None)
            }
            Err(e) if loud => {
                warn!("{step} failed{}: {e:#}", describe(path));
                (None, Some(format!("{e:#}")))
            }
            Err(e) => {
                debug!("{step} failed{}: {e:#}", describe(path));
                (None, Some(format!("{e:#}")))
            }
        };

        self.lock().push(CleanupEvent {
            step,
            path: path.map(Path::to_path_buf),
            error,
        });
        value
    }

    /// Every recorded event, in recording order.
    pub fn events(&self) -> Vec<CleanupEvent> {
        self.lock().clone()
    }

    /// Only the failed events.
    pub fn warnings(&self) -> Vec<CleanupEvent> {
        self.lock().iter().filter(|e| e.is_failure()).cloned().collect()
    }

    pub fn has_warnings(&self) -> bool {
        self.lock().iter().any(CleanupEvent::is_failure)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CleanupEvent>> {
        self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map(|p| format!(" for {}", p.display())).unwrap_or_default()
}
