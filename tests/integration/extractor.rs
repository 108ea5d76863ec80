//! Streamed archive installation through the public extractor API.

use cliup::core::UpdateError;
use cliup::test_utils::ArchiveFixture;
use cliup::upgrade::{CleanupStep, Diagnostics, Extractor};
use std::path::Path;
use tempfile::TempDir;

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if entry.file_type().unwrap().is_dir() {
                stack.push(path);
            } else {
                let relative = path.strip_prefix(dir).unwrap().to_string_lossy().into_owned();
                files.push((relative, std::fs::read(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}

fn siblings(parent: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(parent)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_gzip_release_is_installed_without_symlinks() {
    cliup::test_utils::init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("client").join("3.2.0");
    let archive = ArchiveFixture::release("3.2.0", "my-tool")
        .with_symlink("3.2.0/bin/alias", "my-tool")
        .tar_gz();

    let diagnostics = Diagnostics::new();
    Extractor::new(diagnostics.clone())
        .extract(archive.stream(100), "3.2.0", &destination)
        .await
        .unwrap();

    assert!(destination.join("bin").join("my-tool").is_file());
    assert!(std::fs::symlink_metadata(destination.join("bin").join("alias")).is_err());
    assert_eq!(siblings(&temp.path().join("client")), vec!["3.2.0".to_string()]);
    assert!(!diagnostics.has_warnings());
    assert!(diagnostics.events().iter().any(|e| e.step == CleanupStep::RemoveStaging));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let tool = destination.join("bin").join("my-tool");
        let mode = std::fs::metadata(&tool).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[tokio::test]
async fn test_interrupted_download_leaves_destination_identical() {
    let temp = TempDir::new().unwrap();
    let client = temp.path().join("client");
    let destination = client.join("3.2.0");
    std::fs::create_dir_all(destination.join("bin")).unwrap();
    std::fs::write(destination.join("bin").join("my-tool"), "previous build").unwrap();
    std::fs::write(destination.join("package.json"), "{}").unwrap();
    let before = snapshot(&destination);

    let archive = ArchiveFixture::release("3.2.0", "my-tool")
        .with_file("3.2.0/extra", &[7u8; 4096])
        .tar();
    let half = archive.bytes().len() / 2;
    let err = Extractor::default()
        .extract(archive.failing_stream(512, half), "3.2.0", &destination)
        .await
        .unwrap_err();

    assert!(matches!(
        err.chain().find_map(|e| e.downcast_ref::<UpdateError>()),
        Some(UpdateError::ExtractionFailed { .. })
    ));
    assert_eq!(snapshot(&destination), before);
    assert_eq!(siblings(&client), vec!["3.2.0".to_string()]);
}

#[tokio::test]
async fn test_hard_link_entry_aborts_without_mutation() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("client").join("3.2.0");

    let archive = ArchiveFixture::release("3.2.0", "my-tool")
        .with_hard_link("3.2.0/bin/copy", "3.2.0/bin/my-tool")
        .tar();
    let err = Extractor::default()
        .extract(archive.stream(64), "3.2.0", &destination)
        .await
        .unwrap_err();

    match err.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        Some(UpdateError::UnsupportedEntry { path, .. }) => assert_eq!(path, "3.2.0/bin/copy"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!destination.exists());
    assert!(siblings(&temp.path().join("client")).is_empty());
}
