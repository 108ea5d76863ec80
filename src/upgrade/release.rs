//! Network collaborators of the update engine.
//!
//! The orchestrator never talks HTTP directly. It asks a [`ReleaseSource`] for
//! the latest version on a channel, the version index, the registry dist-tags
//! and finally a byte stream for the chosen archive. [`HttpReleaseSource`] is
//! the production implementation on top of `reqwest`; tests substitute an
//! in-memory source.
//!
//! # Endpoints
//!
//! | Call | Request | Response |
//! |---|---|---|
//! | latest | `GET {base}/channels/{channel}/{bin}-{os}-{arch}-buildmanifest` | `{"version": "3.2.0"}` |
//! | index | `GET {base}/versions/{bin}/{os}-{arch}` | `{"3.2.0": "<archive url>", ...}` |
//! | dist-tags | `GET {registry}/{package}` | `{"dist-tags": {"latest": "3.2.0"}}` |
//! | download | `GET <archive url>` | tar or tar.gz body |

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::config::GlobalConfig;
use crate::core::UpdateError;

/// Version string to download URL. Fetched on demand, never persisted.
pub type VersionIndex = BTreeMap<String, String>;

/// Registry tag to version string.
pub type DistTags = BTreeMap<String, String>;

/// Archive body as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// An archive download in progress.
pub struct Download {
    pub stream: ByteStream,
    /// Advertised body size, when the server sent one.
    pub content_length: Option<u64>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download").field("content_length", &self.content_length).finish()
    }
}

/// Where release metadata and archives come from.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Latest published version on `channel`.
    async fn latest_version(&self, channel: &str) -> Result<String>;

    /// Every published version for this platform.
    async fn version_index(&self) -> Result<VersionIndex>;

    /// Registry dist-tags, used to map an explicit version back to a channel.
    async fn dist_tags(&self) -> Result<DistTags>;

    /// Open the archive at `url` as a stream.
    async fn download(&self, url: &str) -> Result<Download>;
}

/// `os-arch` pair used in release paths (`linux-x64`, `darwin-arm64`, `win32-x64`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            "windows" => "win32",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "x86",
            other => other,
        };
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[derive(Debug, Deserialize)]
struct BuildManifest {
    version: String,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: DistTags,
}

/// [`ReleaseSource`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpReleaseSource {
    client: reqwest::Client,
    base_url: String,
    registry_url: String,
    package: String,
    bin: String,
    platform: Platform,
    metadata_timeout: Duration,
}

impl HttpReleaseSource {
    /// Build a source from the `[release]` settings.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UpdateError::transport("build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.release.base_url.trim_end_matches('/').to_string(),
            registry_url: config.release.registry_url.trim_end_matches('/').to_string(),
            package: config.package().to_string(),
            bin: config.bin().to_string(),
            platform: Platform::current(),
            metadata_timeout: Duration::from_secs(config.release.timeout_secs),
        })
    }

    /// Override the platform used in release paths.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn latest_url(&self, channel: &str) -> String {
        format!(
            "{}/channels/{channel}/{}-{}-buildmanifest",
            self.base_url, self.bin, self.platform
        )
    }

    fn index_url(&self) -> String {
        format!("{}/versions/{}/{}", self.base_url, self.bin, self.platform)
    }

    fn registry_document_url(&self) -> String {
        // Scoped packages are addressed as `@scope%2fname`
        format!("{}/{}", self.registry_url, self.package.replace('/', "%2f"))
    }

    async fn get(&self, operation: &str, url: &str) -> Result<reqwest::Response> {
        debug!("GET {url} ({operation})");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::transport(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {status} from {url}");
            return Err(UpdateError::transport(operation, reason).into());
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: &str) -> Result<T> {
        debug!("GET {url} ({operation})");
        let response = self
            .client
            .get(url)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|e| UpdateError::transport(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {status} from {url}");
            return Err(UpdateError::transport(operation, reason).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| {
                let reason = format!("invalid response from {url}: {e}");
                UpdateError::transport(operation, reason).into()
            })
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn latest_version(&self, channel: &str) -> Result<String> {
        let manifest: BuildManifest =
            self.get_json("fetch latest version", &self.latest_url(channel)).await?;
        Ok(manifest.version)
    }

    async fn version_index(&self) -> Result<VersionIndex> {
        self.get_json("fetch version index", &self.index_url()).await
    }

    async fn dist_tags(&self) -> Result<DistTags> {
        let document: RegistryDocument =
            self.get_json("fetch dist-tags", &self.registry_document_url()).await?;
        Ok(document.dist_tags)
    }

    async fn download(&self, url: &str) -> Result<Download> {
        let response = self.get("download archive", url).await?;
        let content_length = response.content_length();
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Download {
            stream: Box::pin(stream),
            content_length,
        })
    }
}
