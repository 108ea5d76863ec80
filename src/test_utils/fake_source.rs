//! In-memory [`ReleaseSource`] for update tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::UpdateError;
use crate::test_utils::fixtures::{ArchiveBytes, chunked};
use crate::upgrade::release::{DistTags, Download, ReleaseSource, VersionIndex};

/// Serves canned metadata and archives, counting every call.
#[derive(Debug, Default)]
pub struct FakeReleaseSource {
    latest: BTreeMap<String, String>,
    index: VersionIndex,
    archives: HashMap<String, Bytes>,
    dist_tags: Option<DistTags>,
    downloads: AtomicUsize,
    index_fetches: AtomicUsize,
    dist_tag_fetches: AtomicUsize,
    requested_channels: Mutex<Vec<String>>,
}

impl FakeReleaseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `version` as the latest on `channel`.
    #[must_use]
    pub fn with_latest(mut self, channel: &str, version: &str) -> Self {
        self.latest.insert(channel.to_string(), version.to_string());
        self
    }

    /// Add `version` to the index, served from `fake://<version>.tar`.
    #[must_use]
    pub fn with_release(mut self, version: &str, archive: ArchiveBytes) -> Self {
        let url = format!("fake://{version}.tar");
        self.index.insert(version.to_string(), url.clone());
        self.archives.insert(url, archive.into_bytes());
        self
    }

    /// Add a registry dist-tag. Without any, `dist_tags` fails.
    #[must_use]
    pub fn with_dist_tag(mut self, tag: &str, version: &str) -> Self {
        self.dist_tags
            .get_or_insert_with(DistTags::new)
            .insert(tag.to_string(), version.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn index_fetch_count(&self) -> usize {
        self.index_fetches.load(Ordering::SeqCst)
    }

    pub fn dist_tag_fetch_count(&self) -> usize {
        self.dist_tag_fetches.load(Ordering::SeqCst)
    }

    /// Channels passed to `latest_version`, in call order.
    pub fn requested_channels(&self) -> Vec<String> {
        self.requested_channels.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReleaseSource for FakeReleaseSource {
    async fn latest_version(&self, channel: &str) -> Result<String> {
        if let Ok(mut channels) = self.requested_channels.lock() {
            channels.push(channel.to_string());
        }
        self.latest
            .get(channel)
            .cloned()
            .ok_or_else(|| {
                let reason = format!("HTTP 404 for channel {channel}");
                UpdateError::transport("fetch latest version", reason).into()
            })
    }

    async fn version_index(&self) -> Result<VersionIndex> {
        self.index_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.clone())
    }

    async fn dist_tags(&self) -> Result<DistTags> {
        self.dist_tag_fetches.fetch_add(1, Ordering::SeqCst);
        self.dist_tags.clone().ok_or_else(|| anyhow!("registry unavailable"))
    }

    async fn download(&self, url: &str) -> Result<Download> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let body = self
            .archives
            .get(url)
            .cloned()
            .ok_or_else(|| {
                UpdateError::transport("download archive", format!("HTTP 404 from {url}"))
            })?;

        let content_length = Some(body.len() as u64);
        let chunks: Vec<std::io::Result<Bytes>> = chunked(&body, 333).into_iter().map(Ok).collect();
        Ok(Download {
            stream: Box::pin(futures::stream::iter(chunks)),
            content_length,
        })
    }
}
