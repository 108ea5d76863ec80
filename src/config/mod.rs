//! Configuration management for cliup
//!
//! # Modules
//!
//! - `global` - The TOML configuration file (`~/.cliup/config.toml`) with
//!   `[client]`, `[release]` and `[update]` tables
//! - `client` - [`ClientConfig`], the immutable view of the running client that
//!   the update engine consumes
//!
//! # Resolution Order
//!
//! 1. `--config <path>` (or `CLIUP_CONFIG`)
//! 2. The platform default path
//! 3. Built-in defaults when no file exists
//!
//! `CLIUP_DATA_DIR`, `CLIUP_CACHE_DIR` and `CLIUP_BASE_URL` override the loaded
//! values.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cliup::config::GlobalConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let global = GlobalConfig::load_with_optional(None).await?;
//! let client = global.client_config()?;
//! println!("{} {} installs into {}", client.bin(), client.version(), client.root().display());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod global;

pub use client::{ClientConfig, ShimFlavor};
pub use global::{GlobalConfig, ReleaseSection};
