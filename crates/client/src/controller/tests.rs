use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use campus_edge_core::{CacheStorage, EdgeRequest, EdgeResponse, Error, MemoryStorage, RedirectMode, StoreStats};

use super::*;
use crate::fetch::{FetchError, Fetcher};

#[derive(Clone)]
enum Script {
    Respond(EdgeResponse),
    Fail,
    Hang,
}

/// Fetcher double answering per path from a script and recording every call.
#[derive(Default)]
struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn on(&self, path: &str, script: Script) {
        self.scripts.lock().unwrap().insert(path.to_string(), script);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self, path: &str) -> usize {
        self.calls().iter().filter(|p| p.as_str() == path).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError> {
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push(path.clone());
        let script = self.scripts.lock().unwrap().get(&path).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Hang) => std::future::pending().await,
            Some(Script::Fail) | None => Err(FetchError::Offline(path)),
        }
    }
}

/// Storage whose every operation fails, as if the platform store were unavailable.
struct BrokenStorage;

#[async_trait]
impl CacheStorage for BrokenStorage {
    async fn open(&self, _name: &str) -> Result<(), Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
    async fn delete(&self, _name: &str) -> Result<bool, Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
    async fn match_request(&self, _name: &str, _request: &EdgeRequest) -> Result<Option<EdgeResponse>, Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
    async fn put(&self, _name: &str, _request: &EdgeRequest, _response: &EdgeResponse) -> Result<(), Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
    async fn urls(&self, _name: &str) -> Result<Vec<String>, Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
    async fn stats(&self, _name: &str) -> Result<StoreStats, Error> {
        Err(Error::InvalidInput("storage unavailable".into()))
    }
}

const STORE: &str = "campus-engage-v2";

fn origin() -> Url {
    Url::parse("https://campus.test").unwrap()
}

fn get(path: &str) -> EdgeRequest {
    EdgeRequest::get(origin().join(path).unwrap())
}

fn ok(body: &'static str) -> EdgeResponse {
    EdgeResponse::new(200).with_header("content-type", "text/html").with_body(body)
}

fn controller_with(version: &str, storage: &MemoryStorage, fetcher: &Arc<ScriptedFetcher>) -> CacheController {
    let config = ControllerConfig::new("campus-engage", version, origin());
    CacheController::new(config, Arc::new(storage.clone()), fetcher.clone())
}

/// Current-version controller that has not been installed.
fn fresh(storage: &MemoryStorage, fetcher: &Arc<ScriptedFetcher>) -> CacheController {
    controller_with("v2", storage, fetcher)
}

/// Current-version controller already serving requests.
async fn active(storage: &MemoryStorage, fetcher: &Arc<ScriptedFetcher>) -> CacheController {
    let controller = fresh(storage, fetcher);
    controller.set_state(LifecycleState::Active).await;
    controller
}

async fn wait_for_state(controller: &CacheController, expected: LifecycleState) {
    for _ in 0..200 {
        if controller.state().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("controller never reached {expected:?}, stuck at {:?}", controller.state().await);
}

async fn seed(storage: &MemoryStorage, path: &str, body: &'static str) {
    storage.put(STORE, &get(path), &ok(body)).await.unwrap();
}

fn body_of(interception: &Interception) -> Bytes {
    interception.response().expect("expected a response").body.clone()
}

#[tokio::test]
async fn test_precache_is_idempotent() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/offline", Script::Respond(ok("offline page")));
    fetcher.on("/manifest.webmanifest", Script::Respond(ok("{}")));

    let config = ControllerConfig::new("campus-engage", "v2", origin())
        .with_precache(["/offline", "/manifest.webmanifest"]);
    let controller = CacheController::new(config, Arc::new(storage.clone()), fetcher.clone());

    assert_eq!(controller.install().await.unwrap(), 2);
    let first = storage.urls(STORE).await.unwrap();
    assert_eq!(controller.install().await.unwrap(), 2);
    let second = storage.urls(STORE).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        second,
        vec!["https://campus.test/manifest.webmanifest".to_string(), "https://campus.test/offline".to_string()]
    );
}

#[tokio::test]
async fn test_activate_purges_other_versions() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/offline", Script::Respond(ok("offline page")));

    let v1 = controller_with("v1", &storage, &fetcher);
    v1.install().await.unwrap();
    v1.activate().await.unwrap();
    assert_eq!(storage.keys().await.unwrap(), vec!["campus-engage-v1"]);

    let v2 = controller_with("v2", &storage, &fetcher);
    v2.install().await.unwrap();
    let deleted = v2.activate().await.unwrap();

    assert_eq!(deleted, vec!["campus-engage-v1".to_string()]);
    assert_eq!(storage.keys().await.unwrap(), vec!["campus-engage-v2"]);
    assert_eq!(storage.urls("campus-engage-v2").await.unwrap(), vec!["https://campus.test/offline"]);
    assert_eq!(v2.state().await, LifecycleState::Active);
}

#[tokio::test]
async fn test_activate_requires_install() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    let controller = fresh(&storage, &fetcher);

    assert!(matches!(controller.activate().await, Err(Error::InvalidState(_))));
    assert_eq!(controller.state().await, LifecycleState::Parsed);
}

#[tokio::test]
async fn test_install_rejects_redirected_precache() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/offline", Script::Respond(ok("dashboard").redirected(true).with_url("https://campus.test/dashboard")));

    let controller = fresh(&storage, &fetcher);
    let result = controller.install().await;

    assert!(matches!(result, Err(Error::PrecacheFailed { ref url, .. }) if url == "/offline"));
    assert_eq!(controller.state().await, LifecycleState::Redundant);
    assert!(storage.urls(STORE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_install_rejects_error_status_and_writes_nothing() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/offline", Script::Respond(ok("offline page")));
    fetcher.on("/login", Script::Respond(EdgeResponse::new(401)));

    let config = ControllerConfig::new("campus-engage", "v2", origin()).with_precache(["/offline", "/login"]);
    let controller = CacheController::new(config, Arc::new(storage.clone()), fetcher.clone());

    assert!(matches!(controller.install().await, Err(Error::PrecacheFailed { .. })));
    assert!(storage.urls(STORE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redirects_are_never_stored() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    let redirected = ok("somewhere else").redirected(true);
    fetcher.on("/app.js", Script::Respond(redirected.clone()));
    fetcher.on("/api/me", Script::Respond(redirected.clone()));
    fetcher.on("/", Script::Respond(redirected));
    let controller = active(&storage, &fetcher).await;

    controller.handle_request(&get("/app.js")).await;
    controller.handle_request(&get("/api/me")).await;
    let page = controller.handle_request(&get("/")).await;

    assert_eq!(page, Interception::PassThrough(PassReason::RedirectedNavigation));
    assert_eq!(storage.stats(STORE).await.unwrap(), StoreStats::default());
}

#[tokio::test]
async fn test_background_revalidation_skips_redirects() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/dashboard", "cached dashboard").await;
    fetcher.on("/dashboard", Script::Respond(ok("login page").redirected(true)));
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/dashboard")).await;
    assert_eq!(body_of(&result), Bytes::from_static(b"cached dashboard"));

    for _ in 0..100 {
        if fetcher.call_count("/dashboard") > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = storage.match_request(STORE, &get("/dashboard")).await.unwrap().unwrap();
    assert_eq!(stored.body, Bytes::from_static(b"cached dashboard"));
}

#[tokio::test]
async fn test_cache_first_hit_skips_network() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/_next/static/chunks/main-abc123.js", "bundle").await;
    fetcher.on("/_next/static/chunks/main-abc123.js", Script::Fail);
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/_next/static/chunks/main-abc123.js")).await;

    assert_eq!(body_of(&result), Bytes::from_static(b"bundle"));
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_cache_first_miss_stores_and_returns() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/icons/icon-192x192.svg", Script::Respond(ok("<svg/>")));
    let controller = active(&storage, &fetcher).await;

    let first = controller.handle_request(&get("/icons/icon-192x192.svg")).await;
    let second = controller.handle_request(&get("/icons/icon-192x192.svg")).await;

    assert_eq!(body_of(&first), body_of(&second));
    assert_eq!(fetcher.call_count("/icons/icon-192x192.svg"), 1);
}

#[tokio::test]
async fn test_cache_first_offline_miss_is_503_text() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/fonts/inter.woff2")).await;
    let response = result.response().unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.content_type(), Some("text/plain; charset=utf-8"));
    assert_eq!(response.body, Bytes::from_static(fallback::ASSET_UNAVAILABLE.as_bytes()));
}

#[tokio::test]
async fn test_network_first_falls_back_to_cache() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/api/events", r#"[{"id":1}]"#).await;
    fetcher.on("/api/events", Script::Fail);
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/api/events")).await;

    assert_eq!(body_of(&result), Bytes::from_static(br#"[{"id":1}]"#));
    assert_eq!(fetcher.call_count("/api/events"), 1);
}

#[tokio::test]
async fn test_network_first_offline_json() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/api/points/ledger")).await;
    let response = result.response().unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.content_type(), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("offline"));
}

#[tokio::test]
async fn test_network_first_prefers_fresh_and_updates_store() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/api/events", "stale").await;
    fetcher.on("/api/events", Script::Respond(ok("fresh")));
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/api/events")).await;

    assert_eq!(body_of(&result), Bytes::from_static(b"fresh"));
    let stored = storage.match_request(STORE, &get("/api/events")).await.unwrap().unwrap();
    assert_eq!(stored.body, Bytes::from_static(b"fresh"));
}

#[tokio::test]
async fn test_error_statuses_returned_but_not_stored() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/api/shop/redeem", Script::Respond(EdgeResponse::new(500).with_body("boom")));
    fetcher.on("/missing.png", Script::Respond(EdgeResponse::new(404)));
    fetcher.on("/dashboard/gone", Script::Respond(EdgeResponse::new(404)));
    let controller = active(&storage, &fetcher).await;

    for path in ["/api/shop/redeem", "/missing.png", "/dashboard/gone"] {
        let result = controller.handle_request(&get(path)).await;
        assert!(result.response().unwrap().status >= 400, "{path}");
    }

    assert_eq!(storage.stats(STORE).await.unwrap(), StoreStats::default());
}

#[tokio::test]
async fn test_stale_while_revalidate_does_not_wait_for_network() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/dashboard/leaderboard", "cached leaderboard").await;
    fetcher.on("/dashboard/leaderboard", Script::Hang);
    let controller = active(&storage, &fetcher).await;

    let result = tokio::time::timeout(Duration::from_secs(1), controller.handle_request(&get("/dashboard/leaderboard")))
        .await
        .expect("stale copy should be served without waiting on the network");

    assert_eq!(body_of(&result), Bytes::from_static(b"cached leaderboard"));
}

#[tokio::test]
async fn test_stale_while_revalidate_refreshes_in_background() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/dashboard", "old").await;
    fetcher.on("/dashboard", Script::Respond(ok("new")));
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/dashboard")).await;
    assert_eq!(body_of(&result), Bytes::from_static(b"old"));

    let mut refreshed = false;
    for _ in 0..100 {
        let stored = storage.match_request(STORE, &get("/dashboard")).await.unwrap().unwrap();
        if stored.body == Bytes::from_static(b"new") {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(refreshed);
}

#[tokio::test]
async fn test_stale_while_revalidate_miss_waits_and_stores() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/dashboard/shop", Script::Respond(ok("shop")));
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/dashboard/shop")).await;

    assert_eq!(body_of(&result), Bytes::from_static(b"shop"));
    assert!(storage.match_request(STORE, &get("/dashboard/shop")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_offline_navigation_serves_fallback_page() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/offline", "<h1>CampusEngage is offline</h1>").await;
    fetcher.on("/dashboard/unknown", Script::Fail);
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/dashboard/unknown")).await;

    assert_eq!(body_of(&result), Bytes::from_static(b"<h1>CampusEngage is offline</h1>"));
}

#[tokio::test]
async fn test_offline_navigation_without_fallback_is_inline_html() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    let controller = active(&storage, &fetcher).await;

    let result = controller.handle_request(&get("/dashboard/unknown")).await;
    let response = result.response().unwrap();

    assert_eq!(response.content_type(), Some("text/html"));
    assert_eq!(response.body, Bytes::from_static(fallback::INLINE_OFFLINE_PAGE.as_bytes()));
}

#[tokio::test]
async fn test_strategy_selection_is_observable() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    for path in ["/app.js", "/site.css", "/logo.png", "/inter.woff2", "/api/events", "/dashboard/profile"] {
        seed(&storage, path, "cached").await;
        fetcher.on(path, Script::Respond(ok("network")));
    }
    let controller = active(&storage, &fetcher).await;

    for path in ["/app.js", "/site.css", "/logo.png", "/inter.woff2"] {
        let result = controller.handle_request(&get(path)).await;
        assert_eq!(body_of(&result), Bytes::from_static(b"cached"), "{path}");
        assert_eq!(fetcher.call_count(path), 0, "{path} should be cache-first");
    }

    let api = controller.handle_request(&get("/api/events")).await;
    assert_eq!(body_of(&api), Bytes::from_static(b"network"));

    let page = controller.handle_request(&get("/dashboard/profile")).await;
    assert_eq!(body_of(&page), Bytes::from_static(b"cached"));
}

#[tokio::test]
async fn test_pass_through_touches_nothing() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    let controller = active(&storage, &fetcher).await;

    let cases = [
        (get("/api/events").with_method("POST"), PassReason::NonGet),
        (EdgeRequest::get(Url::parse("https://cdn.example.com/x.js").unwrap()), PassReason::CrossOrigin),
        (get("/_next/webpack-hmr"), PassReason::FrameworkInternal),
        (get("/_next/image?url=%2Fa.png&w=64"), PassReason::FrameworkInternal),
        (get("/dashboard").with_header("RSC", "1"), PassReason::RouterPayload),
        (get("/dashboard").with_header("Next-Router-Prefetch", "1"), PassReason::RouterPayload),
    ];

    for (request, reason) in cases {
        assert_eq!(controller.handle_request(&request).await, Interception::PassThrough(reason));
    }

    assert!(fetcher.calls().is_empty());
    assert!(storage.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redirected_response_withheld_from_manual_callers() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/api/session", Script::Respond(ok("login").redirected(true)));
    let controller = active(&storage, &fetcher).await;

    let manual = get("/api/session").with_redirect(RedirectMode::Manual);
    assert_eq!(
        controller.handle_request(&manual).await,
        Interception::PassThrough(PassReason::RedirectNotFollowable)
    );

    let follow = get("/api/session");
    let result = controller.handle_request(&follow).await;
    assert!(result.response().unwrap().redirected);
}

#[tokio::test]
async fn test_storage_failure_is_a_miss() {
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/app.js", Script::Respond(ok("bundle")));
    let config = ControllerConfig::new("campus-engage", "v2", origin());
    let controller = CacheController::new(config, Arc::new(BrokenStorage), fetcher.clone());
    controller.set_state(LifecycleState::Active).await;

    let result = controller.handle_request(&get("/app.js")).await;
    assert_eq!(body_of(&result), Bytes::from_static(b"bundle"));

    let offline = controller.handle_request(&get("/api/events")).await;
    assert_eq!(offline.response().unwrap().status, 503);
}

#[test]
fn test_controller_config_from_app_config() {
    let app = campus_edge_core::AppConfig {
        cache_version: "v9".into(),
        public_origin: Some("https://campus.example".into()),
        ..Default::default()
    };
    let config = ControllerConfig::try_from(&app).unwrap();
    assert_eq!(config.store_name(), "campus-engage-v9");
    assert_eq!(config.origin.host_str(), Some("campus.example"));
    assert_eq!(config.fallback_path, "/offline");
}

#[tokio::test]
async fn test_uninstalled_controller_passes_through() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/app.js", "bundle").await;
    let controller = fresh(&storage, &fetcher);

    for path in ["/app.js", "/api/events", "/dashboard"] {
        assert_eq!(controller.handle_request(&get(path)).await, Interception::PassThrough(PassReason::Inactive));
    }
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_failed_install_leaves_requests_alone() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/app.js", Script::Respond(ok("bundle")));
    let controller = fresh(&storage, &fetcher);

    assert!(controller.install().await.is_err());
    assert_eq!(controller.state().await, LifecycleState::Redundant);
    assert_eq!(
        controller.handle_request(&get("/app.js")).await,
        Interception::PassThrough(PassReason::Inactive)
    );
    assert_eq!(storage.stats(STORE).await.unwrap(), StoreStats::default());
}

#[tokio::test]
async fn test_failed_reinstall_keeps_serving() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/offline", Script::Respond(ok("offline page")));
    let controller = fresh(&storage, &fetcher);
    controller.install().await.unwrap();
    controller.activate().await.unwrap();

    fetcher.on("/offline", Script::Fail);
    assert!(controller.install().await.is_err());

    assert_eq!(controller.state().await, LifecycleState::Active);
    let page = controller.handle_request(&get("/offline")).await;
    assert_eq!(body_of(&page), Bytes::from_static(b"offline page"));
}

#[tokio::test]
async fn test_concurrent_install_rejected() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    fetcher.on("/offline", Script::Hang);
    let controller = Arc::new(fresh(&storage, &fetcher));

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.install().await }
    });
    for _ in 0..200 {
        if fetcher.call_count("/offline") > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(matches!(controller.install().await, Err(Error::InvalidState(_))));
    assert!(matches!(controller.activate().await, Err(Error::InvalidState(_))));
    assert_eq!(controller.state().await, LifecycleState::Installing);
    first.abort();
}

#[tokio::test]
async fn test_boot_retries_until_upstream_recovers() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    storage.open("campus-engage-v1").await.unwrap();
    let controller = Arc::new(fresh(&storage, &fetcher));

    let boot = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.boot(Backoff::new(Duration::from_millis(10), Duration::from_millis(20))).await }
    });

    wait_for_state(&controller, LifecycleState::Redundant).await;
    assert_eq!(storage.keys().await.unwrap(), vec!["campus-engage-v1", STORE]);

    fetcher.on("/offline", Script::Respond(ok("offline page")));
    tokio::time::timeout(Duration::from_secs(2), boot).await.unwrap().unwrap();

    assert_eq!(controller.state().await, LifecycleState::Active);
    assert_eq!(storage.keys().await.unwrap(), vec![STORE]);
    assert!(fetcher.call_count("/offline") >= 2);
}

#[tokio::test]
async fn test_boot_resumes_complete_store_while_upstream_down() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    storage.open("campus-engage-v1").await.unwrap();
    seed(&storage, "/offline", "offline page").await;
    seed(&storage, "/app.js", "bundle").await;
    let controller = Arc::new(fresh(&storage, &fetcher));

    let boot = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.boot(Backoff::new(Duration::from_millis(10), Duration::from_millis(20))).await }
    });

    wait_for_state(&controller, LifecycleState::Active).await;
    assert_eq!(storage.keys().await.unwrap(), vec![STORE]);
    let asset = controller.handle_request(&get("/app.js")).await;
    assert_eq!(body_of(&asset), Bytes::from_static(b"bundle"));

    boot.abort();
}

#[tokio::test]
async fn test_resume_rejects_incomplete_store() {
    let storage = MemoryStorage::new();
    let fetcher = ScriptedFetcher::new();
    seed(&storage, "/app.js", "bundle").await;
    let controller = fresh(&storage, &fetcher);

    assert!(!controller.resume().await.unwrap());
    assert_eq!(controller.state().await, LifecycleState::Parsed);

    seed(&storage, "/offline", "offline page").await;
    assert!(controller.resume().await.unwrap());
    assert_eq!(controller.state().await, LifecycleState::Installed);
}

#[test]
fn test_backoff_doubles_up_to_ceiling() {
    let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(250));
    assert_eq!(backoff.next(Duration::from_millis(100)), Duration::from_millis(200));
    assert_eq!(backoff.next(Duration::from_millis(200)), Duration::from_millis(250));

    let app = campus_edge_core::AppConfig::default();
    assert_eq!(Backoff::from(&app), Backoff::new(Duration::from_secs(1), Duration::from_secs(60)));
}
