use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_DEBOUNCE_WINDOW, DEFAULT_POLL_INTERVAL, DEFAULT_RETENTION_DAYS, SECONDS_PER_DAY,
};

/// Timing settings for the update engine.
///
/// Loaded from the `[update]` table of the global configuration. Every field
/// has a default, so an empty or missing table yields [`UpdateConfig::default`].
///
/// ```toml
/// [update]
/// retention_days = 42
/// debounce_secs = 3600
/// poll_interval_secs = 60
/// ```
///
/// # Examples
///
/// ```rust,no_run
/// use cliup::upgrade::config::UpdateConfig;
/// use std::time::Duration;
///
/// let config = UpdateConfig::default();
/// assert_eq!(config.retention(), Duration::from_secs(42 * 24 * 60 * 60));
/// assert_eq!(config.debounce_window(), Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Days an unused version directory is kept before tidy removes it.
    ///
    /// # Default: `42`
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Minimum number of seconds between two automatic update attempts.
    ///
    /// # Default: `3600` (1 hour)
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Seconds the debounce gate sleeps between two checks of the marker.
    ///
    /// # Default: `60`
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            debounce_secs: default_debounce_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl UpdateConfig {
    /// Retention window as a [`Duration`].
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(SECONDS_PER_DAY))
    }

    /// Debounce window as a [`Duration`].
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    /// Poll interval as a [`Duration`]; never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

const fn default_retention_days() -> u64 {
    DEFAULT_RETENTION_DAYS
}

const fn default_debounce_secs() -> u64 {
    DEFAULT_DEBOUNCE_WINDOW.as_secs()
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}
