//! Rate limiting for automatic updates.
//!
//! The only state is the modification time of `<cache_dir>/lastrun`. The host
//! touches that file; this module only reads it. While `mtime + window` lies in
//! the future the gate sleeps for `poll_interval` and looks again, so the
//! marker being refreshed meanwhile extends the wait.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::utils::fs::get_modified_time;

#[derive(Debug, Clone)]
pub struct DebounceGate {
    marker: PathBuf,
    window: Duration,
    poll_interval: Duration,
}

impl DebounceGate {
    pub fn new(marker: impl Into<PathBuf>, window: Duration, poll_interval: Duration) -> Self {
        Self {
            marker: marker.into(),
            window,
            poll_interval,
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Time left until an attempt is allowed; `None` when allowed now.
    ///
    /// A missing or unreadable marker means there is no previous run.
    pub fn remaining(&self) -> Option<Duration> {
        let modified = get_modified_time(&self.marker).ok()?;
        let eligible_at = modified.checked_add(self.window)?;
        eligible_at.duration_since(SystemTime::now()).ok().filter(|d| !d.is_zero())
    }

    /// Suspend until the debounce window has elapsed.
    ///
    /// Dropping the returned future cancels the wait.
    pub async fn wait_until_eligible(&self) {
        while let Some(remaining) = self.remaining() {
            debug!(
                "Last run too recent ({}s left), sleeping {}s",
                remaining.as_secs(),
                self.poll_interval.as_secs()
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
