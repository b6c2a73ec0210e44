// HTTP API integration tests

mod common;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use common::{FakeNet, FakeProber, FakeTools, scan_config};
use netaudit::alert_repo::{AlertRepo, NewTrigger};
use netaudit::device_repo::DeviceRepo;
use netaudit::metric_repo::MetricRepo;
use netaudit::models::*;
use netaudit::routes;
use netaudit::scan_engine::ScanEngine;
use serde_json::Value;
use std::sync::Arc;

struct TestApp {
    server: TestServer,
    device_repo: Arc<DeviceRepo>,
    alert_repo: Arc<AlertRepo>,
    _dir: tempfile::TempDir,
}

async fn test_app(net: FakeNet) -> TestApp {
    let (dir, pool) = common::test_pool().await;
    let device_repo = Arc::new(DeviceRepo::new(pool.clone()));
    let metric_repo = Arc::new(MetricRepo::new(pool.clone(), 30));
    let alert_repo = Arc::new(AlertRepo::new(pool));
    let prober = Arc::new(FakeProber::new(net));
    let engine = ScanEngine::new(
        device_repo.clone(),
        prober.clone(),
        Arc::new(FakeTools::default()),
        scan_config(),
        Credentials::default(),
    );
    let app = routes::app(
        device_repo.clone(),
        metric_repo,
        alert_repo.clone(),
        engine,
        prober,
    );
    TestApp {
        server: TestServer::new(app).unwrap(),
        device_repo,
        alert_repo,
        _dir: dir,
    }
}

async fn seed_device(app: &TestApp, ip: &str, minutes_ago: i64) -> i64 {
    let mut rec = DeviceRecord::new(ip);
    rec.hostname = Some(format!("host-{}", ip.replace('.', "-")));
    app.device_repo
        .upsert(&rec, Utc::now() - Duration::minutes(minutes_ago))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn version_reports_crate_identity() {
    let app = test_app(FakeNet::default()).await;
    let response = app.server.get("/version").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "netaudit");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn scanner_start_is_accepted_then_conflicts() {
    // Slow pings keep the first scan in flight across both requests
    let app = test_app(FakeNet::default().slow(100)).await;

    let response = app
        .server
        .post("/api/scanner/start")
        .json(&serde_json::json!({ "subnet": "10.0.0.0/26" }))
        .await;
    response.assert_status(axum::http::StatusCode::ACCEPTED);

    let response = app
        .server
        .post("/api/scanner/start")
        .json(&serde_json::json!({ "subnet": "10.0.0.0/26" }))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn scanner_start_rejects_malformed_subnets() {
    let app = test_app(FakeNet::default()).await;
    let response = app
        .server
        .post("/api/scanner/start")
        .json(&serde_json::json!({ "subnet": "500.1.2.3/99" }))
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("invalid subnet"));
}

#[tokio::test]
async fn scanner_status_exposes_progress() {
    let app = test_app(FakeNet::default()).await;
    let response = app.server.get("/api/scanner/status").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["running"], false);
    assert_eq!(body["progress"], 0);
    assert!(body["logs"].as_array().is_some());
}

#[tokio::test]
async fn devices_carry_the_derived_online_flag() {
    let app = test_app(FakeNet::default()).await;
    seed_device(&app, "192.168.1.10", 5).await;
    seed_device(&app, "192.168.1.11", 60).await;

    let response = app.server.get("/api/devices").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let devices = body.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["online"], true);
    assert_eq!(devices[1]["online"], false);
}

#[tokio::test]
async fn individual_scan_audits_one_host() {
    let net = FakeNet::default()
        .host("192.168.1.77", 64)
        .port("192.168.1.77", 22);
    let app = test_app(net).await;

    let response = app
        .server
        .post("/api/scan/individual")
        .json(&serde_json::json!({ "ip": "192.168.1.77" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["deviceType"], "linux");
    assert_eq!(app.device_repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn ip_map_defaults_to_the_densest_subnet() {
    let app = test_app(FakeNet::default()).await;
    seed_device(&app, "192.168.1.10", 5).await;
    seed_device(&app, "192.168.1.11", 5).await;

    let response = app.server.get("/api/ip-map").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["stats"]["subnet"], "192.168.1.0/24");
    assert_eq!(body["stats"]["online"], 2);
    assert_eq!(body["stats"]["total"], 254);
}

#[tokio::test]
async fn ip_map_without_inventory_or_subnet_is_rejected() {
    let app = test_app(FakeNet::default()).await;
    let response = app.server.get("/api/ip-map").await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn free_listing_drops_occupied_addresses() {
    let app = test_app(FakeNet::default()).await;
    seed_device(&app, "10.0.0.1", 5).await;
    seed_device(&app, "10.0.0.2", 60 * 24 * 10).await;

    let response = app
        .server
        .get("/api/ip-map/free")
        .add_query_param("subnet", "10.0.0.0/29")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let ips = body["ips"].as_array().unwrap();
    // 6 usable addresses, one online; the stale one stays as probably_free
    assert_eq!(ips.len(), 5);
    assert!(ips.iter().all(|e| e["ip"] != "10.0.0.1"));
    let stale = ips.iter().find(|e| e["ip"] == "10.0.0.2").unwrap();
    assert_eq!(stale["status"], "probably_free");
    assert_eq!(body["stats"]["online"], 1);
}

#[tokio::test]
async fn suggestions_come_from_the_requested_subnet() {
    let app = test_app(FakeNet::default()).await;
    seed_device(&app, "10.0.0.1", 5).await;

    let response = app
        .server
        .get("/api/ip-map/suggest")
        .add_query_param("subnet", "10.0.0.0/29")
        .add_query_param("count", "3")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let suggestions = body.as_array().unwrap();
    assert_eq!(suggestions.len(), 3);
    for s in suggestions {
        assert_ne!(s["ip"], "10.0.0.1");
        assert_eq!(s["status"], "free");
    }
}

#[tokio::test]
async fn trigger_creation_and_listing() {
    let app = test_app(FakeNet::default()).await;

    let response = app
        .server
        .post("/api/triggers")
        .json(&serde_json::json!({
            "name": "High CPU",
            "metric_type": "cpu_usage",
            "operator": ">",
            "threshold": 90.0,
            "severity": "high"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let response = app.server.get("/api/triggers").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "High CPU");
    assert_eq!(body[0]["operator"], ">");
}

#[tokio::test]
async fn unknown_operator_is_rejected() {
    let app = test_app(FakeNet::default()).await;
    let response = app
        .server
        .post("/api/triggers")
        .json(&serde_json::json!({
            "name": "Bad",
            "metric_type": "cpu_usage",
            "operator": "<>",
            "threshold": 1.0,
            "severity": "info"
        }))
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn alert_ack_flow_over_http() {
    let app = test_app(FakeNet::default()).await;
    let device_id = seed_device(&app, "192.168.1.10", 5).await;

    let trigger_id = app
        .alert_repo
        .insert_trigger(
            &NewTrigger {
                name: "High CPU".into(),
                description: None,
                metric_type: "cpu_usage".into(),
                operator: TriggerOp::Gt,
                threshold: 90.0,
                duration_seconds: 0,
                severity: Severity::High,
                device_type_filter: None,
                enabled: true,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    let triggers = app.alert_repo.list_enabled_triggers().await.unwrap();
    let trigger = triggers.iter().find(|t| t.id == trigger_id).unwrap();
    let alert_id = app
        .alert_repo
        .create_alert_if_absent(device_id, trigger, 97.0, "host-192-168-1-10", Utc::now())
        .await
        .unwrap()
        .unwrap();

    let response = app.server.get("/api/alerts/active").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["hostname"], "host-192-168-1-10");

    let response = app
        .server
        .post(&format!("/api/alerts/{alert_id}/ack"))
        .json(&serde_json::json!({ "username": "operator" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["acknowledged"], true);
    assert_eq!(body["acknowledgedBy"], "operator");

    let response = app.server.get("/api/alerts/count").await;
    let body: Value = response.json();
    assert_eq!(body["high"], 1);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn ack_of_unknown_alert_is_404() {
    let app = test_app(FakeNet::default()).await;
    let response = app
        .server
        .post("/api/alerts/12345/ack")
        .json(&serde_json::json!({ "username": "operator" }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overview_summarizes_the_fleet() {
    let app = test_app(FakeNet::default()).await;
    seed_device(&app, "192.168.1.10", 5).await;
    seed_device(&app, "192.168.1.11", 90).await;

    let response = app.server.get("/api/monitoring/overview").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["devices"], 2);
    assert_eq!(body["online"], 1);
    assert_eq!(body["offline"], 1);
    assert_eq!(body["problemDevices"], 0);
    assert_eq!(body["scanRunning"], false);
    assert_eq!(body["alerts"]["total"], 0);
}
