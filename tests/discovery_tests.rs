mod common;

use std::time::Duration;

use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use webprinter_link::config::DiscoveryConfig;
use webprinter_link::detector::{probe_one, Detector, HttpProbe};
use webprinter_link::server::StubOptions;
use webprinter_link::types::{InstalledInfo, ProbeResult};

use common::{closed_port, loopback_config, serve, stub};

#[tokio::test]
async fn finds_helper_on_second_port() {
    let dead = closed_port().await;
    let (live, _) = stub(StubOptions::default()).await;

    let det = Detector::new();
    let port = det.find_service_port(&loopback_config(vec![dead, live])).await;
    assert_eq!(port, Some(live));
}

#[tokio::test]
async fn check_installed_reports_version() {
    let (live, _) = stub(StubOptions {
        version: "3.1.4".into(),
        ..Default::default()
    })
    .await;

    let info = Detector::new()
        .check_installed(&loopback_config(vec![live]))
        .await;
    assert_eq!(
        info,
        InstalledInfo {
            installed: true,
            port: Some(live),
            version: Some("3.1.4".into())
        }
    );
}

#[tokio::test]
async fn absent_helper_is_not_installed() {
    let dead = closed_port().await;
    let cfg = DiscoveryConfig {
        fixed_port: Some(dead),
        ..loopback_config(vec![])
    };
    let info = Detector::new().check_installed(&cfg).await;
    assert_eq!(info, InstalledInfo::not_installed());
}

#[tokio::test]
async fn every_bad_answer_is_the_same_miss() {
    let (stopped, _) = stub(StubOptions {
        status: "stopped".into(),
        ..Default::default()
    })
    .await;
    let failing = serve(Router::new().route(
        "/status",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": "running" }))) }),
    ))
    .await;
    let slow = serve(Router::new().route(
        "/status",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Json(json!({ "status": "running" }))
        }),
    ))
    .await;
    let garbled = serve(Router::new().route("/status", get(|| async { "running" }))).await;

    let probe = HttpProbe::new();
    let timeout = Duration::from_millis(100);
    for port in [stopped, failing, slow, garbled] {
        let r = probe_one(&probe, "127.0.0.1", port, timeout).await;
        assert_eq!(r, ProbeResult::miss(), "port {port}");
    }
}

#[tokio::test]
async fn localhost_name_resolves_too() {
    let (live, _) = stub(StubOptions::default()).await;
    let cfg = DiscoveryConfig {
        hosts: vec!["localhost".into(), "127.0.0.1".into()],
        fixed_port: Some(live),
        ..loopback_config(vec![])
    };
    let hit = Detector::new().find_service(&cfg).await.expect("found");
    assert_eq!(hit.port, live);
}
