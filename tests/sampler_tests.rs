// Sampler tests: one cycle runs immediately on spawn

mod common;

use chrono::Utc;
use common::{FakeNet, FakeProber, FakeTools, ip};
use netaudit::alert_engine::AlertEngine;
use netaudit::alert_repo::{AlertRepo, NewTrigger};
use netaudit::device_repo::DeviceRepo;
use netaudit::metric_repo::MetricRepo;
use netaudit::models::*;
use netaudit::probe::{DiskUsage, HostMetrics};
use netaudit::sampler::{self, SamplerConfig, SamplerDeps};
use netaudit::local_stats::LocalStats;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    device_repo: Arc<DeviceRepo>,
    metric_repo: Arc<MetricRepo>,
    alert_repo: Arc<AlertRepo>,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let (dir, pool) = common::test_pool().await;
    Harness {
        device_repo: Arc::new(DeviceRepo::new(pool.clone())),
        metric_repo: Arc::new(MetricRepo::new(pool.clone(), 30)),
        alert_repo: Arc::new(AlertRepo::new(pool)),
        _dir: dir,
    }
}

fn spawn_sampler(
    h: &Harness,
    net: FakeNet,
    tools: FakeTools,
    credentials: Credentials,
) -> (tokio::task::JoinHandle<()>, tokio::sync::oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = sampler::spawn(
        SamplerDeps {
            device_repo: h.device_repo.clone(),
            metric_repo: h.metric_repo.clone(),
            alert_engine: Arc::new(AlertEngine::new(h.alert_repo.clone())),
            prober: Arc::new(FakeProber::new(net)),
            tools: Arc::new(tools),
            local_stats: Arc::new(LocalStats::new()),
            credentials,
            shutdown_rx,
        },
        SamplerConfig {
            sample_interval_secs: 300,
            device_concurrency: 4,
            prune_interval_secs: 3600,
        },
    );
    (handle, shutdown_tx)
}

async fn wait_for_metric(h: &Harness, device_id: i64, metric: &str) -> MetricSample {
    for _ in 0..100 {
        if let Some(sample) = h.metric_repo.latest(device_id, metric).await.unwrap() {
            return sample;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("metric {metric} never recorded for device {device_id}");
}

#[tokio::test]
async fn reachable_device_gets_a_latency_sample() {
    let h = harness().await;
    let device_id = h
        .device_repo
        .upsert(&DeviceRecord::new("192.168.1.10"), Utc::now())
        .await
        .unwrap()
        .id;
    let net = FakeNet::default().host("192.168.1.10", 64);
    let (handle, shutdown_tx) = spawn_sampler(&h, net, FakeTools::default(), Credentials::default());

    let sample = wait_for_metric(&h, device_id, "latency").await;
    assert_eq!(sample.unit, "ms");
    assert!(sample.value >= 0.0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn windows_host_metrics_become_per_drive_samples() {
    let h = harness().await;
    let mut rec = DeviceRecord::new("192.168.1.20");
    rec.device_type = DeviceType::Windows;
    let device_id = h.device_repo.upsert(&rec, Utc::now()).await.unwrap().id;

    let net = FakeNet::default().host("192.168.1.20", 128);
    let mut tools = FakeTools::default();
    tools.host_metrics.insert(
        ip("192.168.1.20"),
        HostMetrics {
            cpu_percent: Some(41.0),
            ram_percent: Some(63.0),
            disks: vec![DiskUsage {
                name: "C:".into(),
                used_percent: 88.0,
            }],
        },
    );
    let (handle, shutdown_tx) =
        spawn_sampler(&h, net, tools, Credentials::new("auditor", "secret"));

    let cpu = wait_for_metric(&h, device_id, "cpu_usage").await;
    assert_eq!(cpu.value, 41.0);
    let disk = wait_for_metric(&h, device_id, "disk_usage_C:").await;
    assert_eq!(disk.value, 88.0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn printer_supplies_become_toner_metrics() {
    let h = harness().await;
    let mut rec = DeviceRecord::new("192.168.1.30");
    rec.device_type = DeviceType::Printer;
    let device_id = h.device_repo.upsert(&rec, Utc::now()).await.unwrap().id;

    let net = FakeNet::default().host("192.168.1.30", 64);
    let mut tools = FakeTools::default();
    tools.printers.insert(
        ip("192.168.1.30"),
        PrinterDetail {
            page_count: Some(10234),
            supplies: vec![
                PrinterSupply {
                    name: "Black Cartridge".into(),
                    level: 17,
                },
                PrinterSupply {
                    name: "Drum".into(),
                    level: -1,
                },
            ],
            ..PrinterDetail::default()
        },
    );
    let (handle, shutdown_tx) = spawn_sampler(&h, net, tools, Credentials::default());

    let toner = wait_for_metric(&h, device_id, "toner_Black_Cartridge").await;
    assert_eq!(toner.value, 17.0);
    let pages = wait_for_metric(&h, device_id, "page_count").await;
    assert_eq!(pages.value, 10234.0);
    // Unknown capacity (-1) is never recorded
    assert!(
        h.metric_repo
            .latest(device_id, "toner_Drum")
            .await
            .unwrap()
            .is_none()
    );

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn unreachable_device_records_nothing_but_cycle_continues() {
    let h = harness().await;
    let dead_id = h
        .device_repo
        .upsert(&DeviceRecord::new("192.168.1.40"), Utc::now())
        .await
        .unwrap()
        .id;
    let live_id = h
        .device_repo
        .upsert(&DeviceRecord::new("192.168.1.41"), Utc::now())
        .await
        .unwrap()
        .id;

    let net = FakeNet::default().host("192.168.1.41", 64);
    let (handle, shutdown_tx) = spawn_sampler(&h, net, FakeTools::default(), Credentials::default());

    wait_for_metric(&h, live_id, "latency").await;
    assert!(
        h.metric_repo
            .latest(dead_id, "latency")
            .await
            .unwrap()
            .is_none()
    );

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn samples_flow_into_the_trigger_engine() {
    let h = harness().await;
    let mut rec = DeviceRecord::new("192.168.1.50");
    rec.device_type = DeviceType::Windows;
    rec.hostname = Some("srv-app".into());
    h.device_repo.upsert(&rec, Utc::now()).await.unwrap();

    h.alert_repo
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

    let net = FakeNet::default().host("192.168.1.50", 128);
    let mut tools = FakeTools::default();
    tools.host_metrics.insert(
        ip("192.168.1.50"),
        HostMetrics {
            cpu_percent: Some(99.0),
            ram_percent: None,
            disks: vec![],
        },
    );
    let (handle, shutdown_tx) =
        spawn_sampler(&h, net, tools, Credentials::new("auditor", "secret"));

    for _ in 0..100 {
        if !h.alert_repo.active_alerts().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let active = h.alert_repo.active_alerts().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].alert.title, "High CPU");
    assert_eq!(active[0].hostname, "srv-app");

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}
