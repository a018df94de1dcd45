use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use be_update_service::{BundleRegistry, BundleUpload, DEFAULT_MAX_BUNDLE_SIZE, init_update_service};
use ota_core::{ContentHash, Platform};
use ota_updater::{JsonStateStore, MemoryStateStore, UpdateChecker, UpdaterConfig};
use url::Url;

async fn serve(registry: BundleRegistry) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = init_update_service(registry, DEFAULT_MAX_BUNDLE_SIZE);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

async fn publish(registry: &BundleRegistry, label: &str, content: &[u8]) {
    registry
        .put(
            BundleUpload::builder()
                .app_version("1.0.0")
                .platform(Platform::Android)
                .deployment_key("prod")
                .label(label)
                .content(content.to_vec())
                .build(),
        )
        .await
        .unwrap();
}

fn config(server_url: Url) -> UpdaterConfig {
    UpdaterConfig::builder()
        .server_url(server_url)
        .deployment_key("prod")
        .app_version("1.0.0")
        .platform(Platform::Android)
        .request_timeout(Duration::from_secs(5))
        .build()
}

#[tokio::test(flavor = "multi_thread")]
async fn check_download_install_cycle() {
    let registry = BundleRegistry::in_memory().unwrap();
    publish(&registry, "v1", b"bundle x").await;
    let server_url = serve(registry.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(JsonStateStore::open(dir.path().join("state.json")).await.unwrap());
    let checker = UpdateChecker::over_http(config(server_url.clone()), state.clone()).unwrap();

    let update = checker.check_for_update(None).await.unwrap();
    assert_eq!(update.package_hash(), &ContentHash::compute(b"bundle x"));
    assert!(update.update.download_url.starts_with(server_url.as_str()));
    assert_eq!(update.update.package_size, 8);

    let downloaded = checker.download(&update).await.unwrap();
    assert_eq!(downloaded.content, b"bundle x");
    checker.mark_installed(&downloaded.package).await.unwrap();

    assert!(checker.check_for_update(None).await.is_none());

    publish(&registry, "v2", b"bundle y").await;
    let update = checker.check_for_update(None).await.unwrap();
    assert_eq!(update.update.label, "v2");

    // A rollback survives a restart of the app
    checker.record_failed_install(update.package_hash()).await.unwrap();
    drop(checker);
    let reopened = Arc::new(JsonStateStore::open(dir.path().join("state.json")).await.unwrap());
    let checker = UpdateChecker::over_http(config(server_url), reopened).unwrap();
    let update = checker.check_for_update(None).await.unwrap();
    assert!(update.failed_install);
    assert_eq!(update.update.label, "v2");
}

#[tokio::test(flavor = "multi_thread")]
async fn other_deployment_sees_nothing() {
    let registry = BundleRegistry::in_memory().unwrap();
    publish(&registry, "v1", b"bundle x").await;
    let server_url = serve(registry).await;

    let checker =
        UpdateChecker::over_http(config(server_url), Arc::new(MemoryStateStore::new())).unwrap();
    assert!(checker.check_for_update(Some("staging")).await.is_none());
    assert!(checker.check_for_update(None).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_no_update() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server_url = Url::parse(&format!("http://{addr}")).unwrap();
    let checker =
        UpdateChecker::over_http(config(server_url), Arc::new(MemoryStateStore::new())).unwrap();
    assert!(checker.check_for_update(None).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn hung_server_is_no_update() {
    // Accepts connections and holds them open without ever answering
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = UpdaterConfig::builder()
        .server_url(Url::parse(&format!("http://{addr}")).unwrap())
        .deployment_key("prod")
        .app_version("1.0.0")
        .platform(Platform::Android)
        .request_timeout(Duration::from_secs(1))
        .build();
    let checker = UpdateChecker::over_http(config, Arc::new(MemoryStateStore::new())).unwrap();

    let started = Instant::now();
    assert!(checker.check_for_update(None).await.is_none());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "returned after {elapsed:?}");
}
