//! Global constants used throughout the cliup codebase.
//!
//! This module contains retention windows, polling cadences, reserved
//! directory names and other values shared by the upgrade modules. Defining
//! them centrally keeps the on-disk layout discoverable in one place.

use std::time::Duration;

/// Name of the shim directory under the client root.
pub const BIN_DIR: &str = "bin";

/// Name of the active-version symlink under the client root (POSIX only).
pub const CURRENT_LINK: &str = "current";

/// Entries under the client root that garbage collection never touches.
pub const RESERVED_NAMES: [&str; 2] = [BIN_DIR, CURRENT_LINK];

/// Name of the client root directory inside the data directory.
pub const CLIENT_DIR: &str = "client";

/// File in the data directory holding the persisted channel name.
pub const CHANNEL_FILE: &str = "channel";

/// File in the cache directory whose modification time drives the debounce gate.
pub const LAST_RUN_FILE: &str = "lastrun";

/// Channel used when nothing has been persisted yet.
pub const DEFAULT_CHANNEL: &str = "stable";

/// How long an unused version directory survives before tidy reclaims it (42 days).
pub const DEFAULT_RETENTION_DAYS: u64 = 42;

/// Minimum spacing between two automatic update attempts (1 hour).
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// How often the debounce gate re-checks the marker while waiting (1 minute).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Number of staging directory names tried before extraction gives up.
pub const STAGING_NAME_ATTEMPTS: usize = 5;

/// Marker inserted into staging directory names.
pub const STAGING_MARKER: &str = "partial";

/// Marker inserted into backup directory names.
pub const BACKUP_MARKER: &str = "backup";

/// Read buffer size between the download stream and the unpacker.
pub const STREAM_BUFFER_BYTES: usize = 64 * 1024;

/// Number of attempts made when restoring a parked installation.
pub const RESTORE_ATTEMPTS: u32 = 3;

/// Delay between two restore attempts.
pub const RESTORE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Seconds in one day, used to turn retention days into a [`Duration`].
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
