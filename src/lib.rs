//! cliup - self-update engine for command-line tools
//!
//! cliup keeps every installed version of a CLI side by side under one client
//! root and decides which one runs through a small launcher shim. Updating
//! downloads a release archive, unpacks it into a staging directory, renames it
//! into place, and rewrites the shim. Old versions are garbage collected after
//! a retention period.
//!
//! # Layout
//!
//! ```text
//! <data_dir>/client/
//! ├── bin/<bin>          launcher shim
//! ├── current -> ./3.2.0 (POSIX)
//! ├── 3.1.0/
//! └── 3.2.0/
//! <data_dir>/channel     followed channel
//! <cache_dir>/lastrun    debounce marker
//! ```
//!
//! # Modules
//!
//! - [`upgrade`] - extraction, shims, channels, the update state machine
//! - [`config`] - global TOML configuration and the per-client [`config::ClientConfig`]
//! - [`core`] - error types and user-facing error rendering
//! - [`cli`] - the `cliup` command line
//! - [`utils`] - atomic file writes and progress indicators
//!
//! # Example
//!
//! ```rust,no_run
//! use cliup::config::GlobalConfig;
//! use cliup::upgrade::{HttpReleaseSource, SelfUpdater, UpdateRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let global = GlobalConfig::load_with_optional(None).await?;
//! let source = Arc::new(HttpReleaseSource::from_config(&global)?);
//! let updater = SelfUpdater::new(global.client_config()?, global.update_config(), source);
//! updater.run_update(&UpdateRequest::latest()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod upgrade;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
