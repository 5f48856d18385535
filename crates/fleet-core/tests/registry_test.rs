#![allow(clippy::unwrap_used)]
// Integration tests for `Registry` and `Site` against a wiremock cluster.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleet_core::{CacheConfig, CacheKind, CoreError, Registry, Site, SiteConfig, SiteState};

// ── Helpers ─────────────────────────────────────────────────────────

fn empty_list() -> serde_json::Value {
    json!({ "metadata": { "resourceVersion": "1" }, "items": [] })
}

async fn mount_version(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "gitVersion": "v1.29.3" })))
        .mount(server)
        .await;
}

async fn mount_empty_lists(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/apis?/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_list()))
        .mount(server)
        .await;
}

/// A reachable cluster double with every watched kind empty.
async fn empty_cluster() -> MockServer {
    let server = MockServer::start().await;
    mount_version(&server).await;
    mount_empty_lists(&server).await;
    server
}

fn fast_cache() -> CacheConfig {
    CacheConfig {
        resync_interval: Duration::from_millis(200),
        sync_timeout: Duration::from_millis(500),
    }
}

fn site_for(name: &str, url: &str) -> Site {
    Site::new(
        SiteConfig::new(name, "10.0.0.1", url)
            .with_timeout(Duration::from_secs(2))
            .with_cache(fast_cache()),
    )
}

async fn wait_for_idle(site: &Site) {
    for _ in 0..50 {
        if site.active_sources() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sources still running: {}", site.active_sources());
}

// ── Adding sites ────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_site_against_empty_cluster() {
    let server = empty_cluster().await;
    let registry = Registry::new();

    let site = registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    assert_eq!(registry.site_names().await, vec!["s1".to_string()]);
    assert_eq!(site.state(), SiteState::Ready);
    assert!(site.is_healthy().await);

    let cache = site.cache().unwrap();
    assert!(cache.is_synced());
    for reader in cache.readers() {
        assert!(reader.list().unwrap().is_empty(), "{} not empty", reader.kind());
    }
    assert_eq!(site.active_sources(), 4);

    registry.shutdown().await;
    assert_eq!(site.active_sources(), 0);
}

#[tokio::test]
async fn test_get_site_returns_same_instance() {
    let server = empty_cluster().await;
    let registry = Registry::new();

    let added = registry.add_site(site_for("s1", &server.uri())).await.unwrap();
    let fetched = registry.get_site("s1").await.unwrap();

    assert!(added.same_instance(&fetched));
    assert_eq!(added.id(), fetched.id());
    assert!(fetched.is_healthy().await);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_empty_master_url_is_config_error() {
    let registry = Registry::new();
    let err = registry.add_site(site_for("s1", "")).await.unwrap_err();

    assert!(matches!(err, CoreError::Config { .. }), "got: {err:?}");
    assert!(registry.list_sites().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_cluster_is_connection_error() {
    let registry = Registry::new();
    let site = site_for("s1", "http://127.0.0.1:9");

    let err = registry.add_site(site.clone()).await.unwrap_err();

    assert!(matches!(err, CoreError::Connection { .. }), "got: {err:?}");
    assert!(registry.get_site("s1").await.unwrap_err().is_not_found());
    assert_eq!(site.state(), SiteState::Uninitialized);
    assert_eq!(site.active_sources(), 0);
}

#[tokio::test]
async fn test_failing_lists_are_sync_error_without_leaks() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/apis?/.+"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "etcd down" })))
        .mount(&server)
        .await;

    let registry = Registry::new();
    let site = site_for("s1", &server.uri());

    let err = registry.add_site(site.clone()).await.unwrap_err();

    assert!(matches!(err, CoreError::Sync { .. }), "got: {err:?}");
    assert!(err.is_retryable());
    assert!(registry.is_empty().await);
    assert_eq!(site.state(), SiteState::Uninitialized);
    assert_eq!(site.active_sources(), 0);
}

#[tokio::test]
async fn test_unhealthy_after_init_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "gitVersion": "v1" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_empty_lists(&server).await;

    let registry = Registry::new();
    let site = site_for("s1", &server.uri());

    let err = registry.add_site(site.clone()).await.unwrap_err();

    assert!(matches!(err, CoreError::Unhealthy { .. }), "got: {err:?}");
    assert!(registry.is_empty().await);
    assert!(site.is_closed());
    assert_eq!(site.active_sources(), 0);
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let server = empty_cluster().await;
    let registry = Registry::new();

    let original = registry.add_site(site_for("s1", &server.uri())).await.unwrap();
    let err = registry
        .add_site(site_for("s1", &server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::SiteExists { .. }), "got: {err:?}");
    let kept = registry.get_site("s1").await.unwrap();
    assert!(kept.same_instance(&original));
    assert!(!original.is_closed());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_adds_register_one_instance() {
    let server = empty_cluster().await;
    let registry = Arc::new(Registry::new());

    let a = site_for("s1", &server.uri());
    let b = site_for("s1", &server.uri());
    let (ra, rb) = tokio::join!(
        registry.add_site(a.clone()),
        registry.add_site(b.clone())
    );

    assert_eq!(u8::from(ra.is_ok()) + u8::from(rb.is_ok()), 1);
    assert_eq!(registry.len().await, 1);

    let loser = if ra.is_ok() { &b } else { &a };
    wait_for_idle(loser).await;

    registry.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_adds_of_one_instance_keep_it_running() {
    let server = empty_cluster().await;
    let registry = Registry::new();
    let site = site_for("s1", &server.uri());

    let (ra, rb) = tokio::join!(
        registry.add_site(site.clone()),
        registry.add_site(site.clone())
    );

    assert_eq!(u8::from(ra.is_ok()) + u8::from(rb.is_ok()), 1);
    let err = if let Err(e) = ra { e } else { rb.unwrap_err() };
    assert!(matches!(err, CoreError::SiteExists { .. }), "got: {err:?}");

    let registered = registry.get_site("s1").await.unwrap();
    assert!(registered.same_instance(&site));
    assert!(!registered.is_closed());
    assert_eq!(registered.state(), SiteState::Ready);
    assert!(registry.cache("s1").await.unwrap().is_synced());
    assert_eq!(site.active_sources(), 4);

    registry.shutdown().await;
    assert_eq!(site.active_sources(), 0);
}

// ── Cached reads ────────────────────────────────────────────────────

#[tokio::test]
async fn test_cached_pods_are_visible_after_sync() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": { "resourceVersion": "7" },
            "items": [
                { "metadata": { "name": "web-0", "namespace": "default" }, "status": { "phase": "Running" } },
                { "metadata": { "name": "web-1", "namespace": "default" } }
            ]
        })))
        .mount(&server)
        .await;
    mount_empty_lists(&server).await;

    let registry = Registry::new();
    registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    let cache = registry.cache("s1").await.unwrap();
    let pods = cache.pods().unwrap();
    assert_eq!(pods.len().unwrap(), 2);
    let web0 = pods.get("default/web-0").unwrap().unwrap();
    assert_eq!(web0.body["status"]["phase"], "Running");
    assert!(pods.last_synced().is_some());
    assert!(pods.generation() >= 1);
    assert!(cache.units().unwrap().is_empty().unwrap());
    assert!(cache.reader(CacheKind::custom("bogus")).is_err());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_subscription_sees_resync_changes() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": { "resourceVersion": "1" },
            "items": [{ "metadata": { "name": "web-0", "namespace": "default" } }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": { "resourceVersion": "2" },
            "items": [
                { "metadata": { "name": "web-0", "namespace": "default" } },
                { "metadata": { "name": "web-1", "namespace": "default" } }
            ]
        })))
        .mount(&server)
        .await;
    mount_empty_lists(&server).await;

    let registry = Registry::new();
    registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    let cache = registry.cache("s1").await.unwrap();
    let pods = cache.pods().unwrap();
    let mut stream = pods.subscribe();
    let mut latest = stream.current().clone();
    while latest.len() < 2 {
        latest = tokio::time::timeout(Duration::from_secs(2), stream.changed())
            .await
            .expect("no resync published within 2s")
            .unwrap();
    }

    assert_eq!(latest.len(), 2);
    assert_eq!(latest[1].metadata.name, "web-1");
    assert_eq!(pods.len().unwrap(), 2);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_accessors_before_init_fail_fast() {
    let site = site_for("s1", "http://127.0.0.1:9");
    assert!(matches!(site.cache(), Err(CoreError::NotReady { .. })));
    assert!(matches!(site.clients(), Err(CoreError::NotReady { .. })));
}

// ── Passthroughs ────────────────────────────────────────────────────

#[tokio::test]
async fn test_hosts_passthrough_uses_site_client() {
    let server = empty_cluster().await;
    Mock::given(method("GET"))
        .and(path("/apis/hosts.fleet.io/v1/hosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {},
            "items": [{ "metadata": { "name": "h1" } }]
        })))
        .mount(&server)
        .await;

    let registry = Registry::new();
    registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    let hosts = registry.hosts("s1").await.unwrap().list().await.unwrap();
    assert_eq!(hosts.items.len(), 1);
    assert_eq!(hosts.items[0].metadata.name, "h1");

    let err = registry.units("s2").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { ref name } if name == "s2"));

    registry.shutdown().await;
}

// ── Close and removal ───────────────────────────────────────────────

#[tokio::test]
async fn test_close_is_idempotent_and_concurrent_safe() {
    let server = empty_cluster().await;
    let registry = Registry::new();
    let site = registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let site = site.clone();
            tokio::spawn(async move { site.close() })
        })
        .collect();
    let mut released = 0;
    for handle in handles {
        if handle.await.unwrap() {
            released += 1;
        }
    }

    assert_eq!(released, 1);
    assert!(!site.close());
    assert_eq!(site.state(), SiteState::Closed);
    wait_for_idle(&site).await;
    assert!(matches!(site.cache(), Err(CoreError::SiteClosed { .. })));

    registry.shutdown().await;
}

#[tokio::test]
async fn test_remove_site_then_get_is_not_found() {
    let server = empty_cluster().await;
    let registry = Registry::new();
    let site = registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    registry.remove_site("s1").await.unwrap();

    assert!(registry.get_site("s1").await.unwrap_err().is_not_found());
    assert!(registry.list_sites().await.is_empty());
    assert!(site.is_closed());
    assert_eq!(site.active_sources(), 0);
    assert!(registry.remove_site("s1").await.unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_and_remove() {
    let server = empty_cluster().await;
    let registry = Arc::new(Registry::new());
    registry.add_site(site_for("s1", &server.uri())).await.unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for _ in 0..100 {
                    match registry.get_site("s1").await {
                        Ok(site) => assert_eq!(site.name(), "s1"),
                        Err(e) => assert!(e.is_not_found()),
                    }
                    let _ = registry.list_sites().await;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let remover = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.remove_site("s1").await })
    };

    for reader in readers {
        reader.await.unwrap();
    }
    remover.await.unwrap().unwrap();
    assert!(registry.get_site("s1").await.unwrap_err().is_not_found());
}

// ── Deadlines ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_ensure_ready_deadline_cancels_attempt() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/apis?/.+"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(empty_list())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let site = site_for("s1", &server.uri());
    let err = site
        .ensure_ready(Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Sync { .. }), "got: {err:?}");
    assert_eq!(site.state(), SiteState::Uninitialized);
    wait_for_idle(&site).await;
}

#[tokio::test]
async fn test_close_during_init_aborts_the_attempt() {
    let server = MockServer::start().await;
    mount_version(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/apis?/.+"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(empty_list())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let site = Site::new(
        SiteConfig::new("s1", "10.0.0.1", &server.uri())
            .with_timeout(Duration::from_secs(5))
            .with_cache(CacheConfig {
                resync_interval: Duration::from_millis(200),
                sync_timeout: Duration::from_secs(5),
            }),
    );
    let pending = {
        let site = site.clone();
        tokio::spawn(async move { site.init().await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(site.close());

    let err = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("init did not return after close")
        .unwrap()
        .unwrap_err();
    assert!(
        matches!(err, CoreError::Sync { .. } | CoreError::SiteClosed { .. }),
        "got: {err:?}"
    );
    assert_eq!(site.state(), SiteState::Closed);
    wait_for_idle(&site).await;
    assert!(matches!(site.init().await, Err(CoreError::SiteClosed { .. })));
    assert!(matches!(site.cache(), Err(CoreError::SiteClosed { .. })));
}

#[tokio::test]
async fn test_init_is_one_shot() {
    let server = empty_cluster().await;
    let site = site_for("s1", &server.uri());

    let (a, b) = tokio::join!(site.init(), site.init());
    a.unwrap();
    b.unwrap();
    site.init().await.unwrap();

    let version_calls = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/version")
        .count();
    assert_eq!(version_calls, 1);
    assert_eq!(site.active_sources(), 4);

    site.shutdown().await;
    assert_eq!(site.active_sources(), 0);
}
