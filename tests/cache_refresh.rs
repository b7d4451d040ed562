//! Pull-cache refresh against a live upstream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vhost_gateway::net::client_config;
use vhost_gateway::refresh::{CacheRefresher, RefreshReport};

mod common;

fn refresher(dir: &std::path::Path) -> CacheRefresher {
    CacheRefresher::new(
        dir,
        Duration::from_secs(3600),
        Duration::from_secs(5),
        client_config().unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn refresh_replaces_content_entirely() {
    let body = Arc::new(Mutex::new("OK".to_string()));

    let served = body.clone();
    let upstream = common::start_programmable_backend(move || {
        let served = served.clone();
        async move { (200, served.lock().unwrap().clone()) }
    })
    .await;

    let cache = tempfile::tempdir().unwrap();
    common::write(cache.path(), "lib.js.txt", &format!("  http://{}/lib.js\n", upstream));
    let refresher = refresher(cache.path());

    let report = refresher.refresh_once().await;
    assert_eq!(report, RefreshReport { updated: 1, failed: 0 });
    assert_eq!(std::fs::read_to_string(cache.path().join("lib.js")).unwrap(), "OK");

    *body.lock().unwrap() = "OK2".to_string();
    refresher.refresh_once().await;
    assert_eq!(std::fs::read_to_string(cache.path().join("lib.js")).unwrap(), "OK2");
    assert!(!cache.path().join(".lib.js.part").exists());
}

#[tokio::test]
async fn error_status_keeps_previous_content() {
    let upstream = common::start_programmable_backend(|| async { (503, "down".to_string()) }).await;

    let cache = tempfile::tempdir().unwrap();
    common::write(cache.path(), "font.css.txt", &format!("http://{}/font.css", upstream));
    common::write(cache.path(), "font.css", "previous");

    let report = refresher(cache.path()).refresh_once().await;
    assert_eq!(report, RefreshReport { updated: 0, failed: 1 });
    assert_eq!(std::fs::read_to_string(cache.path().join("font.css")).unwrap(), "previous");
}

#[tokio::test]
async fn one_bad_entry_does_not_stop_the_pass() {
    let upstream = common::start_programmable_backend(|| async { (200, "fresh".to_string()) }).await;

    let cache = tempfile::tempdir().unwrap();
    common::write(cache.path(), "a.txt", "");
    common::write(cache.path(), "nested/b.txt", &format!("http://{}/b", upstream));

    let report = refresher(cache.path()).refresh_once().await;
    assert_eq!(report, RefreshReport { updated: 1, failed: 1 });
    assert_eq!(std::fs::read_to_string(cache.path().join("nested/b")).unwrap(), "fresh");
}

#[tokio::test]
async fn refreshed_entry_is_served_under_cache_prefix() {
    let upstream = common::start_programmable_backend(|| async { (200, "remote asset".to_string()) }).await;

    let site = common::site();
    common::write(site.path(), "cache/app.js.txt", &format!("http://{}/app.js", upstream));

    let mut config = common::config_for(site.path());
    config.cache.enabled = true;
    config.cache.update_interval_secs = 3600;
    let (addr, shutdown) = common::spawn_gateway(config).await;

    let mut body = String::new();
    for _ in 0..50 {
        let res = common::client()
            .get(format!("http://{}/cache/app.js", addr))
            .send()
            .await
            .unwrap();
        if res.status().is_success() {
            body = res.text().await.unwrap();
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(body, "remote asset");

    shutdown.trigger();
}
