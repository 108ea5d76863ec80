//! Progress indicators for downloads and extraction
//!
//! This module wraps `indicatif` with cliup's styling. A download with a known
//! `Content-Length` gets a byte progress bar; everything else gets a spinner.
//!
//! # Environment Variables
//!
//! - `CLIUP_NO_PROGRESS`: Set to any value to disable all progress indicators
//!
//! The `--no-progress` flag has the same effect for a single invocation; the
//! CLI hands it to the updater instead of touching the environment.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cliup::utils::progress::ProgressBar;
//!
//! let bar = ProgressBar::new_bytes(Some(2_048));
//! bar.set_message("Downloading 3.2.0");
//! bar.inc(1_024);
//! bar.finish_with_message("Installed 3.2.0");
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable that disables progress rendering.
pub const NO_PROGRESS_ENV: &str = "CLIUP_NO_PROGRESS";

/// Checks if progress bars should be disabled.
///
/// Progress is disabled when `CLIUP_NO_PROGRESS` is set to any value.
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress indicator with consistent styling.
///
/// Cloning is cheap; clones drive the same bar, which lets the download loop
/// and the extractor share one indicator.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a byte-counting bar when `len` is known, a spinner otherwise.
    pub fn new_bytes(len: Option<u64>) -> Self {
        match len {
            Some(len) if !is_progress_disabled() => {
                let bar = IndicatifBar::new(len);
                bar.set_style(download_style());
                Self { inner: bar }
            }
            _ => Self::new_spinner(),
        }
    }

    /// Creates a spinner for work of unknown size.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self { inner: bar }
    }

    /// Creates a bar that renders nothing.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Sets the message displayed next to the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Advances the bar by `delta` units (bytes for download bars).
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Current position, mainly useful in tests.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Finishes the bar and leaves `msg` on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finishes the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{msg:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|style| style.progress_chars("━╸━"))
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {bytes}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}
