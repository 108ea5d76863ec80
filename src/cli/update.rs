//! Update the managed client.
//!
//! # Examples
//!
//! ```bash
//! cliup update                      # latest on the persisted channel
//! cliup update 3.2.0                # install or switch to 3.2.0
//! cliup update 3.2.0 --force        # reinstall even if present
//! cliup update --channel stable-rc  # follow another channel
//! cliup update --autoupdate         # background run, debounced
//! cliup update --available          # list published versions
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use super::CliConfig;
use crate::config::GlobalConfig;
use crate::upgrade::{HttpReleaseSource, SelfUpdater, UpdateOutcome, UpdateReport, UpdateRequest};
use crate::utils::progress::is_progress_disabled;

/// Arguments of `cliup update`.
#[derive(Args, Debug, Clone, Default)]
pub struct UpdateCommand {
    /// Version to install or switch to. Defaults to the latest on the channel.
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Channel to follow instead of the persisted one.
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Download and reinstall even when the version is current or installed.
    #[arg(short, long)]
    pub force: bool,

    /// Automatic run: wait out the debounce window first.
    #[arg(long)]
    pub autoupdate: bool,

    /// List published versions instead of updating.
    #[arg(long, conflicts_with_all = ["version", "force", "autoupdate"])]
    pub available: bool,
}

impl UpdateCommand {
    /// The request this invocation describes.
    pub fn request(&self) -> UpdateRequest {
        UpdateRequest {
            target_version: self.version.clone(),
            channel: self.channel.clone(),
            force: self.force,
            auto_update: self.autoupdate,
        }
    }

    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let global = GlobalConfig::load_with_optional(cli.config_path.clone()).await?;
        let source = Arc::new(HttpReleaseSource::from_config(&global)?);
        let updater = SelfUpdater::new(global.client_config()?, global.update_config(), source)
            .with_progress(!cli.no_progress && !is_progress_disabled());

        if self.available {
            return list_available(&updater).await;
        }

        let report = updater.run_update(&self.request()).await?;
        print_report(&updater, &report);
        Ok(())
    }
}

async fn list_available(updater: &SelfUpdater) -> Result<()> {
    let current = updater.current_version().await;
    for entry in updater.available_versions().await? {
        let line = if entry.version == current {
            format!("{} (current)", entry.version).green().bold().to_string()
        } else if entry.installed {
            format!("{} (installed)", entry.version).green().to_string()
        } else {
            entry.version.clone()
        };
        println!("{line}");
    }
    Ok(())
}

fn print_report(updater: &SelfUpdater, report: &UpdateReport) {
    let bin = updater.config().bin();
    match &report.outcome {
        UpdateOutcome::NotUpdatable => {
            println!("{}", format!("{bin} is not managed by cliup; nothing to update").yellow());
            if let Some(instructions) = updater.config().update_instructions() {
                println!("{instructions}");
            }
        }
        UpdateOutcome::AlreadyOnVersion { version, channel } => {
            println!("{}", format!("{bin} is already on {version} ({channel})").green());
        }
        UpdateOutcome::SwitchedLocal {
            version,
            channel,
            ..
        } => {
            println!("{}", format!("Switched {bin} to {version} ({channel})").green());
        }
        UpdateOutcome::Installed {
            version,
            channel,
            ..
        } => {
            println!("{}", format!("Installed {bin} {version} ({channel})").green().bold());
        }
    }

    if let Some(tidy) = &report.tidy
        && !tidy.removed.is_empty()
    {
        println!("Removed {} unused version(s): {}", tidy.removed.len(), tidy.removed.join(", "));
    }

    let warnings = updater.diagnostics().warnings();
    if !warnings.is_empty() {
        println!(
            "{}",
            format!(
                "{} cleanup step(s) failed; run with --verbose for details",
                warnings.len()
            )
            .yellow()
        );
    }
}
