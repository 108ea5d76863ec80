//! Smoke tests for the `cliup` binary.

use assert_cmd::Command;
use cliup::test_utils::ArchiveFixture;
use cliup::upgrade::Platform;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cliup() -> Command {
    let mut cmd = Command::cargo_bin("cliup").unwrap();
    for var in ["CLIUP_CONFIG", "CLIUP_DATA_DIR", "CLIUP_CACHE_DIR", "CLIUP_BASE_URL", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd.env("CLIUP_NO_PROGRESS", "1");
    cmd
}

fn write_config(dir: &Path, base_url: &str, updatable: bool) -> std::path::PathBuf {
    let config = format!(
        r#"[client]
bin = "my-tool"
version = "3.1.0"
data_dir = '{data}'
cache_dir = '{cache}'
updatable = {updatable}

[release]
base_url = "{base_url}"
registry_url = "{base_url}/registry"
"#,
        data = dir.join("data").display(),
        cache = dir.join("cache").display(),
    );
    let path = dir.join("config.toml");
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_help_lists_update() {
    cliup().arg("--help").assert().success().stdout(predicate::str::contains("update"));
    cliup()
        .args(["update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--channel").and(predicate::str::contains("--available")));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    cliup().args(["--verbose", "--quiet", "update"]).assert().failure();
}

#[test]
fn test_not_updatable_client_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "http://127.0.0.1:9", false);

    cliup()
        .arg("--config")
        .arg(&config)
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("not managed by cliup"));
    assert!(!temp.path().join("data").join("client").exists());
}

#[test]
fn test_invalid_config_reports_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "[client\nbin = ").unwrap();

    cliup()
        .arg("--config")
        .arg(&config)
        .arg("update")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_installs_version() {
    let server = MockServer::start().await;
    let platform = Platform::current();
    let archive = ArchiveFixture::release("3.2.0", "my-tool").tar_gz();
    Mock::given(method("GET"))
        .and(path(format!("/versions/my-tool/{platform}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"3.2.0": format!("{}/archives/3.2.0.tar.gz", server.uri())})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/archives/3.2.0.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.bytes().to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &server.uri(), true);

    let output = tokio::task::spawn_blocking(move || {
        cliup()
            .arg("--no-progress")
            .arg("--config")
            .arg(&config)
            .args(["update", "3.2.0"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Installed my-tool 3.2.0"));
    let root = temp.path().join("data").join("client");
    assert!(root.join("3.2.0").join("bin").join("my-tool").is_file());
    assert!(root.join("bin").exists());
}
