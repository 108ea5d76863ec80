use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::core::UpdateError;
use crate::upgrade::channel::ChannelResolver;
use crate::upgrade::config::UpdateConfig;
use crate::upgrade::debounce::DebounceGate;
use crate::upgrade::diagnostics::{CleanupStep, Diagnostics};
use crate::upgrade::extractor::Extractor;
use crate::upgrade::hooks::{HookContext, NoopHooks, UpdateHooks};
use crate::upgrade::release::ReleaseSource;
use crate::upgrade::shim;
use crate::upgrade::store::{TidyReport, VersionStore, sort_versions, validate_version};
use crate::utils::progress::ProgressBar;

/// Steps of a single update run, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    ResolveCurrent,
    ResolveChannel,
    DecideTarget,
    NoOp,
    SwitchLocal,
    DownloadAndInstall,
    ActivateShim,
    Touch,
    Tidy,
    Done,
}

/// What [`decide_target`] chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDecision {
    /// Already on the wanted version.
    NoOp { version: String },
    /// The wanted version is installed; only the shim changes.
    SwitchLocal { version: String },
    /// The wanted version must be downloaded and extracted.
    DownloadAndInstall { version: String },
}

impl TargetDecision {
    pub fn version(&self) -> &str {
        match self {
            Self::NoOp { version }
            | Self::SwitchLocal { version }
            | Self::DownloadAndInstall { version } => version,
        }
    }
}

/// Choose between doing nothing, switching to a local install, or downloading.
///
/// - No `requested` version: the target is `latest`; equal to `current`
///   without `force` means [`TargetDecision::NoOp`].
/// - `requested` and installed locally, without `force`:
///   [`TargetDecision::SwitchLocal`].
/// - Everything else downloads.
pub fn decide_target(
    current: &str,
    requested: Option<&str>,
    latest: Option<&str>,
    force: bool,
    installed_locally: bool,
) -> TargetDecision {
    match requested {
        None => {
            let version = latest.unwrap_or(current).to_string();
            if version == current && !force {
                TargetDecision::NoOp { version }
            } else {
                TargetDecision::DownloadAndInstall { version }
            }
        }
        Some(version) if installed_locally && !force => TargetDecision::SwitchLocal {
            version: version.to_string(),
        },
        Some(version) => TargetDecision::DownloadAndInstall {
            version: version.to_string(),
        },
    }
}

/// Parameters of one update run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Explicit version; `None` follows the channel.
    pub target_version: Option<String>,
    /// Channel override; `None` resolves it from disk and the registry.
    pub channel: Option<String>,
    /// Reinstall even when the version is current or present.
    pub force: bool,
    /// Automatic run, subject to the debounce gate.
    pub auto_update: bool,
}

impl UpdateRequest {
    /// Follow the persisted channel to its latest version.
    pub fn latest() -> Self {
        Self::default()
    }

    /// Install or switch to `version`.
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            target_version: Some(version.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub const fn auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }
}

/// How an update run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Another package manager owns the install.
    NotUpdatable,
    /// The active version already is the wanted one.
    AlreadyOnVersion { version: String, channel: String },
    /// Switched to an installed version without downloading.
    SwitchedLocal {
        version: String,
        channel: String,
        config: ClientConfig,
    },
    /// Downloaded, extracted and activated a version.
    Installed {
        version: String,
        channel: String,
        config: ClientConfig,
    },
}

impl UpdateOutcome {
    /// The configuration describing the active version after the run, if it changed.
    pub const fn config(&self) -> Option<&ClientConfig> {
        match self {
            Self::SwitchedLocal { config, .. } | Self::Installed { config, .. } => Some(config),
            _ => None,
        }
    }
}

/// Result of [`SelfUpdater::run_update`].
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub outcome: UpdateOutcome,
    /// Garbage collection result; `None` when the run stopped early.
    pub tidy: Option<TidyReport>,
    /// Every state the run passed through.
    pub states: Vec<UpdateState>,
}

/// An entry of [`SelfUpdater::available_versions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableVersion {
    pub version: String,
    pub url: String,
    pub installed: bool,
}

/// Drives the update of one client.
///
/// Composes the channel resolver, the release source, the extractor, the shim
/// generator and the version store. Cleanup outcomes land in the shared
/// [`Diagnostics`], available through [`SelfUpdater::diagnostics`].
///
/// # Examples
///
/// ```rust,no_run
/// use cliup::config::GlobalConfig;
/// use cliup::upgrade::{HttpReleaseSource, SelfUpdater, UpdateRequest};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let global = GlobalConfig::load_with_optional(None).await?;
/// let source = Arc::new(HttpReleaseSource::from_config(&global)?);
/// let updater = SelfUpdater::new(global.client_config()?, global.update_config(), source);
///
/// let report = updater.run_update(&UpdateRequest::version("3.2.0")).await?;
/// println!("{:?}", report.outcome);
/// # Ok(())
/// # }
/// ```
pub struct SelfUpdater {
    config: ClientConfig,
    update_config: UpdateConfig,
    source: Arc<dyn ReleaseSource>,
    hooks: Arc<dyn UpdateHooks>,
    diagnostics: Diagnostics,
    show_progress: bool,
}

impl SelfUpdater {
    pub fn new(
        config: ClientConfig,
        update_config: UpdateConfig,
        source: Arc<dyn ReleaseSource>,
    ) -> Self {
        Self {
            config,
            update_config,
            source,
            hooks: Arc::new(NoopHooks),
            diagnostics: Diagnostics::new(),
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn UpdateHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn store(&self) -> VersionStore {
        VersionStore::new(
            self.config.root(),
            self.update_config.retention(),
            self.diagnostics.clone(),
        )
    }

    fn channels(&self) -> ChannelResolver {
        ChannelResolver::new(self.config.channel_file(), self.diagnostics.clone())
    }

    /// Version the shim currently points at, or the running version.
    pub async fn current_version(&self) -> String {
        shim::current_version(&self.config.shim_path(), self.config.version()).await
    }

    /// Run one update.
    ///
    /// Failures while resolving the target, downloading or extracting abort
    /// before the shim is rewritten. Touch and tidy failures are only recorded
    /// in [`Diagnostics`]. A requested version that cannot name a version
    /// directory fails with [`UpdateError::InvalidVersion`] before anything is
    /// fetched or written.
    pub async fn run_update(&self, request: &UpdateRequest) -> Result<UpdateReport> {
        let mut states = vec![UpdateState::Idle];

        if let Some(version) = &request.target_version {
            validate_version(version)?;
        }

        if request.auto_update {
            DebounceGate::new(
                self.config.last_run_file(),
                self.update_config.debounce_window(),
                self.update_config.poll_interval(),
            )
            .wait_until_eligible()
            .await;
        }

        if !self.config.updatable() {
            warn!("{} was not installed by this updater; skipping update", self.config.bin());
            if let Some(instructions) = self.config.update_instructions() {
                warn!("{instructions}");
            }
            states.push(UpdateState::Done);
            return Ok(UpdateReport {
                outcome: UpdateOutcome::NotUpdatable,
                tidy: None,
                states,
            });
        }

        enter(&mut states, UpdateState::ResolveCurrent);
        let current = self.current_version().await;

        enter(&mut states, UpdateState::ResolveChannel);
        let requested = request.target_version.as_deref();
        let channel = match &request.channel {
            Some(channel) => channel.clone(),
            None => self.channels().determine_channel(self.source.as_ref(), requested).await,
        };

        enter(&mut states, UpdateState::DecideTarget);
        let latest = match requested {
            Some(_) => None,
            None => {
                let latest = self
                    .source
                    .latest_version(&channel)
                    .await
                    .with_context(|| format!("Failed to fetch the latest version on {channel}"))?;
                validate_version(&latest)
                    .with_context(|| format!("Channel {channel} advertises an unusable version"))?;
                Some(latest)
            }
        };
        let installed_locally = match requested {
            Some(version) => self.store().has_version(version).await,
            None => false,
        };
        let decision = decide_target(
            &current,
            requested,
            latest.as_deref(),
            request.force,
            installed_locally,
        );
        info!("Current version {current}, channel {channel}, decision {decision:?}");

        let context = HookContext {
            from_version: current.clone(),
            to_version: decision.version().to_string(),
            channel: channel.clone(),
        };

        let outcome = match decision {
            TargetDecision::NoOp { version } => {
                enter(&mut states, UpdateState::NoOp);
                UpdateOutcome::AlreadyOnVersion { version, channel }
            }
            TargetDecision::SwitchLocal { version } => {
                enter(&mut states, UpdateState::SwitchLocal);
                self.hooks.preupdate(&context).await.context("preupdate hook failed")?;
                self.activate(&mut states, &version)?;
                self.hooks.update(&context).await.context("update hook failed")?;
                UpdateOutcome::SwitchedLocal {
                    config: self.config.with_version(&version),
                    version,
                    channel,
                }
            }
            TargetDecision::DownloadAndInstall { version } => {
                enter(&mut states, UpdateState::DownloadAndInstall);
                self.download_and_install(&version, &context).await?;
                self.activate(&mut states, &version)?;
                self.hooks.update(&context).await.context("update hook failed")?;
                if requested.is_none() {
                    let persisted = self.channels().set_channel(&channel);
                    self.diagnostics.record(
                        CleanupStep::PersistChannel,
                        Some(&self.config.channel_file()),
                        persisted,
                    );
                }
                UpdateOutcome::Installed {
                    config: self.config.with_version(&version),
                    version,
                    channel,
                }
            }
        };

        let active = match &outcome {
            UpdateOutcome::AlreadyOnVersion { version, .. }
            | UpdateOutcome::SwitchedLocal { version, .. }
            | UpdateOutcome::Installed { version, .. } => version.clone(),
            UpdateOutcome::NotUpdatable => current,
        };

        let store = self.store();
        enter(&mut states, UpdateState::Touch);
        if store.has_version(&active).await {
            let touched = store.touch(&active);
            self.diagnostics.record(CleanupStep::Touch, Some(&store.version_dir(&active)), touched);
        } else {
            debug!("{active} has no version directory, nothing to touch");
        }

        enter(&mut states, UpdateState::Tidy);
        let tidy = store.tidy(&active).await;

        enter(&mut states, UpdateState::Done);
        Ok(UpdateReport {
            outcome,
            tidy: Some(tidy),
            states,
        })
    }

    async fn download_and_install(&self, version: &str, context: &HookContext) -> Result<()> {
        let store = self.store();
        store.ensure_root()?;

        let index = self.source.version_index().await.context("Failed to fetch the version index")?;
        let Some(url) = index.get(version) else {
            let mut available: Vec<String> = index.keys().cloned().collect();
            sort_versions(&mut available);
            return Err(UpdateError::VersionNotFound {
                version: version.to_string(),
                available,
            }
            .into());
        };

        self.hooks.preupdate(context).await.context("preupdate hook failed")?;

        let download = self.source.download(url).await?;
        let bar = if self.show_progress {
            ProgressBar::new_bytes(download.content_length)
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(format!("Downloading {version}"));

        let counter = bar.clone();
        let stream = download.stream.inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                counter.inc(bytes.len() as u64);
            }
        });

        let extracted = Extractor::new(self.diagnostics.clone())
            .extract(stream, version, &store.version_dir(version))
            .await;
        match &extracted {
            Ok(()) => bar.finish_and_clear(),
            Err(_) => bar.finish_with_message(format!("Failed to install {version}")),
        }
        extracted
    }

    fn activate(&self, states: &mut Vec<UpdateState>, version: &str) -> Result<()> {
        enter(states, UpdateState::ActivateShim);
        shim::create_bin(&self.config, version)?;
        info!("Activated {} {version}", self.config.bin());
        Ok(())
    }

    /// Every published version, newest first, flagged when installed locally.
    pub async fn available_versions(&self) -> Result<Vec<AvailableVersion>> {
        let index = self.source.version_index().await.context("Failed to fetch the version index")?;
        let installed = self.store().installed_versions().await?;

        let mut versions: Vec<String> = index.keys().cloned().collect();
        sort_versions(&mut versions);
        versions.reverse();

        Ok(versions
            .into_iter()
            .map(|version| AvailableVersion {
                installed: installed.contains(&version),
                url: index.get(&version).cloned().unwrap_or_default(),
                version,
            })
            .collect())
    }
}

fn enter(states: &mut Vec<UpdateState>, state: UpdateState) {
    debug!("Update state: {state:?}");
    states.push(state);
}
