//! `HttpReleaseSource` against a local wiremock server.

use cliup::config::{ClientConfig, GlobalConfig};
use cliup::core::UpdateError;
use cliup::test_utils::ArchiveFixture;
use cliup::upgrade::{
    HttpReleaseSource, Platform, ReleaseSource, SelfUpdater, UpdateConfig, UpdateRequest,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer) -> HttpReleaseSource {
    let mut config = GlobalConfig::default();
    config.client.bin = Some("my-tool".to_string());
    config.release.base_url = server.uri();
    config.release.registry_url = format!("{}/registry", server.uri());
    HttpReleaseSource::from_config(&config).unwrap().with_platform(Platform {
        os: "linux".to_string(),
        arch: "x64".to_string(),
    })
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_metadata_endpoints() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/channels/stable/my-tool-linux-x64-buildmanifest",
        json!({"version": "3.2.0"}),
    )
    .await;
    mount_json(
        &server,
        "/versions/my-tool/linux-x64",
        json!({
            "3.1.0": "https://cdn.example.com/3.1.0.tar.gz",
            "3.2.0": "https://cdn.example.com/3.2.0.tar.gz"
        }),
    )
    .await;
    mount_json(
        &server,
        "/registry/my-tool",
        json!({"name": "my-tool", "dist-tags": {"latest": "3.2.0", "latest-rc": "3.3.0-rc.1"}}),
    )
    .await;

    let source = source(&server);
    assert_eq!(source.latest_version("stable").await.unwrap(), "3.2.0");

    let index = source.version_index().await.unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index["3.1.0"], "https://cdn.example.com/3.1.0.tar.gz");

    let tags = source.dist_tags().await.unwrap();
    assert_eq!(tags["latest-rc"], "3.3.0-rc.1");
}

#[tokio::test]
async fn test_http_errors_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/versions/my-tool/linux-x64"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/channels/beta/my-tool-linux-x64-buildmanifest",
        json!({"unexpected": true}),
    )
    .await;

    let source = source(&server);

    let err = source.version_index().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdateError>(),
        Some(UpdateError::TransportFailure { .. })
    ));

    let err = source.latest_version("stable").await.unwrap_err();
    assert!(err.to_string().contains("404"));

    let err = source.latest_version("beta").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdateError>(),
        Some(UpdateError::TransportFailure { .. })
    ));
}

#[tokio::test]
async fn test_download_streams_body() {
    let server = MockServer::start().await;
    let archive = ArchiveFixture::release("3.2.0", "my-tool").tar_gz();
    Mock::given(method("GET"))
        .and(path("/archives/3.2.0.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.bytes().to_vec()))
        .mount(&server)
        .await;

    let download =
        source(&server).download(&format!("{}/archives/3.2.0.tar.gz", server.uri())).await.unwrap();
    assert_eq!(download.content_length, Some(archive.bytes().len() as u64));

    let mut received = Vec::new();
    let mut stream = download.stream;
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, archive.bytes());
}

#[tokio::test]
async fn test_update_over_http() {
    let server = MockServer::start().await;
    let archive = ArchiveFixture::release("3.2.0", "my-tool").tar_gz();
    mount_json(
        &server,
        "/versions/my-tool/linux-x64",
        json!({"3.2.0": format!("{}/archives/3.2.0.tar.gz", server.uri())}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/archives/3.2.0.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.bytes().to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config =
        ClientConfig::new("my-tool", "3.1.0", temp.path().join("data"), temp.path().join("cache"));
    let updater =
        SelfUpdater::new(config.clone(), UpdateConfig::default(), Arc::new(source(&server)));

    let report = updater.run_update(&UpdateRequest::version("3.2.0")).await.unwrap();

    assert_eq!(report.outcome.config().unwrap().version(), "3.2.0");
    assert!(config.root().join("3.2.0").join("bin").join("my-tool").is_file());
    // The registry has no document for my-tool, so the channel falls back
    let warnings = updater.diagnostics().warnings();
    assert!(warnings.iter().any(|e| e.error.as_deref().unwrap_or("").contains("dist-tags")));
}
