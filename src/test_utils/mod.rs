//! Test utilities for cliup
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`ArchiveFixture`] - builds tar / tar.gz release archives
//! - [`FakeReleaseSource`] - in-memory release metadata and downloads
//! - [`init_test_logging`] - opt-in tracing output for tests
//! - [`age_path`] - backdates a directory for retention tests

pub mod fake_source;
pub mod fixtures;

pub use fake_source::FakeReleaseSource;
pub use fixtures::{ArchiveBytes, ArchiveFixture};

use std::path::Path;
use std::sync::Once;
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`. With neither, tests stay
/// silent.
///
/// ```bash
/// RUST_LOG=cliup=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Set the modification time of `path` to `days` days ago.
pub fn age_path(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * crate::constants::SECONDS_PER_DAY);
    crate::utils::fs::set_modified(path, when).expect("backdate path");
}
