//! The update state machine over an in-memory release source.

use cliup::config::{ClientConfig, ShimFlavor};
use cliup::core::UpdateError;
use cliup::test_utils::{ArchiveFixture, FakeReleaseSource, age_path};
use cliup::upgrade::shim::{current_version, parse_shim_version};
use cliup::upgrade::{SelfUpdater, UpdateConfig, UpdateOutcome, UpdateRequest, VersionStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TOOL: &str = "my-tool";

struct Harness {
    _temp: TempDir,
    config: ClientConfig,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config =
            ClientConfig::new(TOOL, "3.1.0", temp.path().join("data"), temp.path().join("cache"));
        Self {
            _temp: temp,
            config,
        }
    }

    fn updater(&self, source: &Arc<FakeReleaseSource>) -> SelfUpdater {
        SelfUpdater::new(self.config.clone(), UpdateConfig::default(), source.clone())
    }

    fn root(&self) -> PathBuf {
        self.config.root().to_path_buf()
    }
}

#[tokio::test]
async fn test_end_to_end_install_into_empty_root() {
    cliup::test_utils::init_test_logging(None);
    let harness = Harness::new();
    let source = Arc::new(
        FakeReleaseSource::new()
            .with_release("3.2.0", ArchiveFixture::release("3.2.0", TOOL).tar_gz()),
    );

    let report = harness
        .updater(&source)
        .run_update(&UpdateRequest::version("3.2.0"))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        UpdateOutcome::Installed { ref version, .. } if version == "3.2.0"
    ));
    assert_eq!(report.outcome.config().unwrap().version(), "3.2.0");

    let root = harness.root();
    assert!(root.join("3.2.0").join("bin").join(TOOL).is_file());

    let shim = std::fs::read_to_string(harness.config.shim_path()).unwrap();
    match harness.config.shim_flavor() {
        ShimFlavor::Posix => assert!(shim.contains(&format!("../3.2.0/bin/{TOOL}"))),
        ShimFlavor::Cmd => assert!(shim.contains(&format!("..\\3.2.0\\bin\\{TOOL}"))),
    }
    assert_eq!(parse_shim_version(&shim).as_deref(), Some("3.2.0"));

    #[cfg(unix)]
    {
        assert_eq!(std::fs::read_link(root.join("current")).unwrap(), PathBuf::from("./3.2.0"));
        assert!(std::fs::canonicalize(root.join("current")).unwrap().ends_with("3.2.0"));
    }
}

#[tokio::test]
async fn test_unknown_version_leaves_shim_untouched() {
    let harness = Harness::new();
    let source = Arc::new(
        FakeReleaseSource::new()
            .with_release("3.1.0", ArchiveFixture::release("3.1.0", TOOL).tar())
            .with_release("3.2.0", ArchiveFixture::release("3.2.0", TOOL).tar()),
    );
    let updater = harness.updater(&source);
    updater.run_update(&UpdateRequest::version("3.1.0")).await.unwrap();
    let shim_before = std::fs::read(harness.config.shim_path()).unwrap();

    let err = updater.run_update(&UpdateRequest::version("4.0.0")).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("4.0.0"));
    assert!(message.contains("3.1.0"));
    assert!(message.contains("3.2.0"));
    assert!(matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::VersionNotFound { .. })));
    assert_eq!(std::fs::read(harness.config.shim_path()).unwrap(), shim_before);
    assert_eq!(source.download_count(), 1);
}

#[tokio::test]
async fn test_switch_back_to_installed_version() {
    let harness = Harness::new();
    let source = Arc::new(
        FakeReleaseSource::new()
            .with_release("3.1.0", ArchiveFixture::release("3.1.0", TOOL).tar())
            .with_release("3.2.0", ArchiveFixture::release("3.2.0", TOOL).tar()),
    );
    let updater = harness.updater(&source);

    updater.run_update(&UpdateRequest::version("3.1.0")).await.unwrap();
    updater.run_update(&UpdateRequest::version("3.2.0")).await.unwrap();
    assert_eq!(source.download_count(), 2);

    let report = updater.run_update(&UpdateRequest::version("3.1.0")).await.unwrap();

    assert!(matches!(
        report.outcome,
        UpdateOutcome::SwitchedLocal { ref version, .. } if version == "3.1.0"
    ));
    assert_eq!(source.download_count(), 2);
    assert_eq!(current_version(&harness.config.shim_path(), "none").await, "3.1.0");
    assert!(harness.root().join("3.2.0").exists());
}

#[tokio::test]
async fn test_latest_equal_to_current_does_not_extract() {
    let harness = Harness::new();
    let source = Arc::new(
        FakeReleaseSource::new()
            .with_latest("stable", "3.2.0")
            .with_release("3.2.0", ArchiveFixture::release("3.2.0", TOOL).tar()),
    );
    let updater = harness.updater(&source);
    updater.run_update(&UpdateRequest::latest()).await.unwrap();
    let shim_path = harness.config.shim_path();
    let written = std::fs::metadata(&shim_path).unwrap().modified().unwrap();

    let report = updater.run_update(&UpdateRequest::latest()).await.unwrap();

    assert!(matches!(
        report.outcome,
        UpdateOutcome::AlreadyOnVersion { ref version, .. } if version == "3.2.0"
    ));
    assert_eq!(source.download_count(), 1);
    assert_eq!(std::fs::metadata(&shim_path).unwrap().modified().unwrap(), written);
}

#[tokio::test]
async fn test_install_collects_versions_past_retention() {
    let harness = Harness::new();
    let root = harness.root();
    for (version, age) in [("2.0.0", 43), ("2.5.0", 41)] {
        std::fs::create_dir_all(root.join(version).join("bin")).unwrap();
        age_path(&root.join(version), age);
    }
    let source = Arc::new(
        FakeReleaseSource::new()
            .with_release("3.2.0", ArchiveFixture::release("3.2.0", TOOL).tar()),
    );

    let report = harness
        .updater(&source)
        .run_update(&UpdateRequest::version("3.2.0"))
        .await
        .unwrap();

    let tidy = report.tidy.unwrap();
    assert_eq!(tidy.removed, vec!["2.0.0".to_string()]);
    assert!(tidy.failed.is_empty());
    assert!(!root.join("2.0.0").exists());
    assert!(root.join("2.5.0").exists());
    assert!(root.join("bin").exists());

    let store = VersionStore::new(&root, UpdateConfig::default().retention(), Default::default());
    assert_eq!(
        store.installed_versions().await.unwrap(),
        vec!["2.5.0".to_string(), "3.2.0".to_string()]
    );
}

#[tokio::test]
async fn test_autoupdate_waits_for_debounce_window() {
    let harness = Harness::new();
    std::fs::create_dir_all(harness.config.cache_dir()).unwrap();
    std::fs::write(harness.config.last_run_file(), "").unwrap();
    let source = Arc::new(FakeReleaseSource::new().with_latest("stable", "3.1.0"));

    let request = UpdateRequest::latest().auto_update(true);
    let updater = harness.updater(&source);
    let blocked =
        tokio::time::timeout(Duration::from_millis(300), updater.run_update(&request)).await;

    assert!(blocked.is_err(), "automatic update ran inside the debounce window");
    assert!(source.requested_channels().is_empty());
}
