//! Command-line interface for cliup.
//!
//! # Available Commands
//!
//! - `update` - install, switch to, or list versions of the managed client
//!
//! # Global Options
//!
//! ```bash
//! cliup --verbose update          # debug logging
//! cliup --quiet update 3.2.0      # errors only
//! cliup --no-progress update      # no progress bars, for scripts and CI
//! cliup --config ./cliup.toml update --available
//! ```
//!
//! The configuration path can also come from `CLIUP_CONFIG`; see
//! [`crate::config::GlobalConfig`] for the file format.

mod update;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use update::UpdateCommand;

/// Runtime settings derived from the global flags.
///
/// Passed down to commands instead of being written to the process
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Disable progress indicators.
    pub no_progress: bool,

    /// Custom path to the global configuration file.
    pub config_path: Option<PathBuf>,
}

/// Main CLI structure for cliup.
#[derive(Parser, Debug)]
#[command(
    name = "cliup",
    about = "Self-update engine for command-line tools",
    version,
    long_about = "cliup keeps several versions of a CLI side by side and switches between them through a launcher shim."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging).
    ///
    /// Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom global configuration file.
    ///
    /// Defaults to `~/.cliup/config.toml`.
    #[arg(short, long, global = true, env = "CLIUP_CONFIG")]
    config: Option<PathBuf>,

    /// Disable progress bars and spinners.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update the client to the latest version on its channel, or to VERSION.
    Update(UpdateCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive the runtime settings from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress || self.quiet,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Update(cmd) => cmd.execute(&config).await,
        }
    }
}
