//! Launcher shims.
//!
//! The shim in `<root>/bin` is the only record of which installed version is
//! active. Writing a new shim (and, on POSIX, repointing `<root>/current`)
//! is what "activating" a version means.
//!
//! Both flavors call the target through a path relative to the shim's own
//! directory (`../<version>/bin/<bin>`), so the client root can be moved as a
//! whole. [`parse_shim_version`] relies on that shape to read the active
//! version back.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::config::{ClientConfig, ShimFlavor};
use crate::constants::CURRENT_LINK;
use crate::upgrade::store::validate_version;
use crate::utils::fs::{atomic_write, atomic_write_executable};

/// Make `version` the one the launcher invokes.
///
/// Writes the shim atomically and, for the POSIX flavor, atomically replaces
/// the `current` symlink with `./<version>`. Calling it twice with the same
/// version produces the same shim and pointer. Returns the shim path.
///
/// Fails with [`UpdateError::InvalidVersion`](crate::core::UpdateError::InvalidVersion)
/// without writing anything when `version` is not a usable directory name.
pub fn create_bin(config: &ClientConfig, version: &str) -> Result<PathBuf> {
    validate_version(version)?;
    let shim = config.shim_path();
    match config.shim_flavor() {
        ShimFlavor::Posix => {
            let script = render_posix(config.bin(), &config.env_prefix(), version);
            atomic_write_executable(&shim, script.as_bytes())
                .with_context(|| format!("Failed to write shim {}", shim.display()))?;
            replace_current_link(config.root(), version)?;
        }
        ShimFlavor::Cmd => {
            let script = render_cmd(config.bin(), &config.env_prefix(), version);
            atomic_write(&shim, script.as_bytes())
                .with_context(|| format!("Failed to write shim {}", shim.display()))?;
        }
    }

    debug!("Shim {} now targets {version}", shim.display());
    Ok(shim)
}

/// Bash launcher that resolves its own location through any symlink chain.
pub fn render_posix(bin: &str, env_prefix: &str, version: &str) -> String {
    format!(
        r#"#!/usr/bin/env bash
set -e
get_script_dir () {{
  SOURCE="${{BASH_SOURCE[0]}}"
  while [ -h "$SOURCE" ]; do
    DIR="$( cd -P "$( dirname "$SOURCE" )" && pwd )"
    SOURCE="$( readlink "$SOURCE" )"
    [[ $SOURCE != /* ]] && SOURCE="$DIR/$SOURCE"
  done
  DIR="$( cd -P "$( dirname "$SOURCE" )" && pwd )"
  echo "$DIR"
}}
DIR=$(get_script_dir)
export {env_prefix}_REDIRECTED=1
export {env_prefix}_BINPATH="$DIR/{bin}"
exec "$DIR/../{version}/bin/{bin}" "$@"
"#
    )
}

/// Batch launcher for Windows.
pub fn render_cmd(bin: &str, env_prefix: &str, version: &str) -> String {
    [
        "@echo off".to_string(),
        "setlocal enableextensions".to_string(),
        format!("set {env_prefix}_REDIRECTED=1"),
        format!("set {env_prefix}_BINPATH=%~dp0{bin}"),
        format!("\"%~dp0..\\{version}\\bin\\{bin}.cmd\" %*"),
        String::new(),
    ]
    .join("\r\n")
}

#[cfg(unix)]
fn replace_current_link(root: &Path, version: &str) -> Result<()> {
    let link = root.join(CURRENT_LINK);
    let temp = crate::utils::fs::hidden_sibling(&link, "tmp");
    let target = format!("./{version}");

    std::os::unix::fs::symlink(&target, &temp)
        .with_context(|| format!("Failed to create symlink {}", temp.display()))?;
    if let Err(e) = std::fs::rename(&temp, &link) {
        let _ = std::fs::remove_file(&temp);
        return Err(e).with_context(|| format!("Failed to replace {}", link.display()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn replace_current_link(root: &Path, version: &str) -> Result<()> {
    debug!("No {CURRENT_LINK} link on this platform ({} -> {version})", root.display());
    Ok(())
}

static SHIM_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.\.[\\/]([^\\/"\s]+)[\\/]bin"#).expect("shim target pattern is valid")
});

/// Extract the version a shim points at.
pub fn parse_shim_version(content: &str) -> Option<String> {
    SHIM_TARGET.captures(content).map(|c| c[1].to_string())
}

/// Version referenced by the shim at `shim_path`, or `fallback` when the shim
/// is missing or unparseable.
pub async fn current_version(shim_path: &Path, fallback: &str) -> String {
    match tokio::fs::read_to_string(shim_path).await {
        Ok(content) => parse_shim_version(&content).unwrap_or_else(|| {
            debug!("Could not parse {}, assuming {fallback}", shim_path.display());
            fallback.to_string()
        }),
        Err(e) => {
            debug!("No shim at {} ({e}), assuming {fallback}", shim_path.display());
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &Path, flavor: ShimFlavor) -> ClientConfig {
        ClientConfig::new("my-tool", "3.1.0", root.join("data"), root.join("cache"))
            .with_root(root.join("client"))
            .with_shim_flavor(flavor)
    }

    #[test]
    fn test_posix_script_shape() {
        let script = render_posix("my-tool", "MY_TOOL", "3.2.0");
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains("export MY_TOOL_REDIRECTED=1"));
        assert!(script.contains("export MY_TOOL_BINPATH=\"$DIR/my-tool\""));
        assert!(script.contains("exec \"$DIR/../3.2.0/bin/my-tool\" \"$@\""));
        assert!(script.contains("while [ -h \"$SOURCE\" ]"));
    }

    #[test]
    fn test_cmd_script_shape() {
        let script = render_cmd("my-tool", "MY_TOOL", "3.2.0");
        assert!(script.contains("set MY_TOOL_REDIRECTED=1\r\n"));
        assert!(script.contains("set MY_TOOL_BINPATH=%~dp0my-tool\r\n"));
        assert!(script.contains("\"%~dp0..\\3.2.0\\bin\\my-tool.cmd\" %*"));
    }

    #[test]
    fn test_parse_both_flavors() {
        assert_eq!(parse_shim_version(&render_posix("t", "T", "3.2.0")).as_deref(), Some("3.2.0"));
        assert_eq!(
            parse_shim_version(&render_cmd("t", "T", "3.2.0-rc.1")).as_deref(),
            Some("3.2.0-rc.1")
        );
        assert_eq!(parse_shim_version("#!/bin/sh\necho hi\n"), None);
    }

    #[tokio::test]
    async fn test_current_version_falls_back() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("bin").join("my-tool");
        assert_eq!(current_version(&missing, "3.1.0").await, "3.1.0");

        std::fs::create_dir_all(missing.parent().unwrap()).unwrap();
        std::fs::write(&missing, "garbage").unwrap();
        assert_eq!(current_version(&missing, "3.1.0").await, "3.1.0");
    }

    #[tokio::test]
    async fn test_create_bin_cmd_flavor() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path(), ShimFlavor::Cmd);

        let shim = create_bin(&config, "3.2.0").unwrap();
        assert_eq!(shim, temp.path().join("client").join("bin").join("my-tool.cmd"));
        assert_eq!(current_version(&shim, "x").await, "3.2.0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_bin_posix_is_idempotent() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let config = config(temp.path(), ShimFlavor::Posix);
        std::fs::create_dir_all(temp.path().join("client").join("3.2.0")).unwrap();

        let shim = create_bin(&config, "3.2.0").unwrap();
        let first = std::fs::read_to_string(&shim).unwrap();
        create_bin(&config, "3.2.0").unwrap();
        let second = std::fs::read_to_string(&shim).unwrap();
        assert_eq!(first, second);

        let mode = std::fs::metadata(&shim).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);

        let current = temp.path().join("client").join("current");
        assert_eq!(std::fs::read_link(&current).unwrap(), PathBuf::from("./3.2.0"));
        assert_eq!(current_version(&shim, "x").await, "3.2.0");

        let entries: Vec<_> = std::fs::read_dir(temp.path().join("client"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect();
        assert!(entries.is_empty(), "temporary files left behind: {entries:?}");
    }

    #[test]
    fn test_create_bin_refuses_reserved_names() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path(), ShimFlavor::Posix);

        for version in ["current", "bin", "..", "3.2.0/../../x"] {
            assert!(create_bin(&config, version).is_err());
        }
        assert!(!config.shim_path().exists());
        assert!(std::fs::symlink_metadata(temp.path().join("client").join("current")).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_bin_switches_pointer() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path(), ShimFlavor::Posix);

        create_bin(&config, "3.1.0").unwrap();
        let shim = create_bin(&config, "3.2.0").unwrap();

        let current = temp.path().join("client").join("current");
        assert_eq!(std::fs::read_link(&current).unwrap(), PathBuf::from("./3.2.0"));
        assert_eq!(current_version(&shim, "x").await, "3.2.0");
    }
}
