//! Update channel resolution.
//!
//! The persisted channel lives in `<data_dir>/channel` as plain text and
//! defaults to `stable`. When the user asks for an explicit version, the
//! registry dist-tags are consulted: if that version is what a tag currently
//! points at, the tag's channel wins. Registry failures never surface; the
//! persisted channel is used instead.
//!
//! | Tag | Channel |
//! |---|---|
//! | `latest` | `stable` |
//! | `latest-rc` | `stable-rc` |
//! | anything else | unchanged |

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::DEFAULT_CHANNEL;
use crate::upgrade::diagnostics::{CleanupStep, Diagnostics};
use crate::upgrade::release::ReleaseSource;
use crate::utils::fs::atomic_write;

/// Map a registry tag to a channel name.
pub fn tag_to_channel(tag: &str) -> String {
    match tag {
        "latest" => "stable".to_string(),
        "latest-rc" => "stable-rc".to_string(),
        other => other.to_string(),
    }
}

/// Reads, resolves and persists the update channel.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    channel_file: PathBuf,
    diagnostics: Diagnostics,
}

impl ChannelResolver {
    pub fn new(channel_file: impl Into<PathBuf>, diagnostics: Diagnostics) -> Self {
        Self {
            channel_file: channel_file.into(),
            diagnostics,
        }
    }

    pub fn channel_file(&self) -> &Path {
        &self.channel_file
    }

    /// The persisted channel, trimmed; `stable` when absent or empty.
    pub async fn persisted_channel(&self) -> String {
        match tokio::fs::read_to_string(&self.channel_file).await {
            Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
            Ok(_) => DEFAULT_CHANNEL.to_string(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Cannot read {}: {e}", self.channel_file.display());
                }
                DEFAULT_CHANNEL.to_string()
            }
        }
    }

    /// Effective channel for an update to `target_version`.
    ///
    /// Without a target version the registry is not queried.
    pub async fn determine_channel(
        &self,
        source: &dyn ReleaseSource,
        target_version: Option<&str>,
    ) -> String {
        let persisted = self.persisted_channel().await;
        let Some(target) = target_version else {
            return persisted;
        };

        let tags = source.dist_tags().await.context("Failed to query dist-tags");
        let tags = self.diagnostics.record_quiet(CleanupStep::ResolveChannel, None, tags);
        let Some(tags) = tags else {
            debug!("Falling back to persisted channel {persisted}");
            return persisted;
        };

        match tags.iter().find(|(_, version)| version.as_str() == target) {
            Some((tag, _)) => {
                let channel = tag_to_channel(tag);
                debug!("{target} is tagged {tag}, using channel {channel}");
                channel
            }
            None => persisted,
        }
    }

    /// Persist `channel` atomically.
    pub fn set_channel(&self, channel: &str) -> Result<()> {
        atomic_write(&self.channel_file, channel.as_bytes())
            .with_context(|| {
                format!("Failed to persist channel to {}", self.channel_file.display())
            })
    }
}
