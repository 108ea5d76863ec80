//! Self-update engine.
//!
//! A client managed by cliup keeps every installed version side by side under
//! its root and launches through a small shim that names exactly one of them.
//! Updating means getting the wanted version onto disk, then rewriting the shim.
//!
//! # Update Flow
//!
//! ```text
//! Idle
//!  └── ResolveCurrent      read the version out of the shim
//!       └── ResolveChannel persisted channel, dist-tags for explicit versions
//!            └── DecideTarget
//!                 ├── NoOp                already on it
//!                 ├── SwitchLocal         installed, only the shim changes
//!                 └── DownloadAndInstall  stream, stage, rename into place
//!                      └── ActivateShim
//!                           └── Touch ── Tidy ── Done
//! ```
//!
//! # Safety Mechanisms
//!
//! - Archives are unpacked into a hidden staging sibling and committed with a
//!   single rename; a failure leaves the destination as it was.
//! - An existing install is parked by [`backup::BackupManager`] during the
//!   commit and restored if the rename fails.
//! - The shim and the `current` link are replaced atomically, so a crash never
//!   leaves a launcher pointing at a half-written version.
//! - Cleanup steps never fail an update; they report through
//!   [`diagnostics::Diagnostics`].
//!
//! # Usage
//!
//! ```bash
//! cliup update              # follow the persisted channel
//! cliup update 3.2.0        # install or switch to 3.2.0
//! cliup update --channel stable-rc
//! cliup update --available  # list published versions
//! ```

/// Parking and restoring an existing install around a commit.
pub mod backup;
/// Channel persistence and dist-tag resolution.
pub mod channel;
/// Retention and debounce settings.
pub mod config;
/// Rate limiting for automatic updates.
pub mod debounce;
/// Reporting sink for best-effort cleanup steps.
pub mod diagnostics;
/// Streaming tar extraction with atomic commit.
pub mod extractor;
/// Host callbacks around activation.
pub mod hooks;
/// Release metadata and archive downloads.
pub mod release;
/// The update state machine.
pub mod self_updater;
/// Launcher shim generation and parsing.
pub mod shim;
/// Installed versions and garbage collection.
pub mod store;


pub use channel::ChannelResolver;
pub use config::UpdateConfig;
pub use debounce::DebounceGate;
pub use diagnostics::{CleanupEvent, CleanupStep, Diagnostics};
pub use extractor::Extractor;
pub use hooks::{HookContext, NoopHooks, UpdateHooks};
pub use release::{HttpReleaseSource, Platform, ReleaseSource};
pub use self_updater::{
    AvailableVersion, SelfUpdater, TargetDecision, UpdateOutcome, UpdateReport, UpdateRequest,
    UpdateState, decide_target,
};
pub use store::{TidyReport, VersionStore, validate_version};
