// DeviceRepo tests: upsert semantics, listing, bookkeeping

mod common;

use chrono::{Duration, Utc};
use netaudit::device_repo::DeviceRepo;
use netaudit::models::*;

fn record(ip: &str) -> DeviceRecord {
    DeviceRecord::new(ip)
}

#[tokio::test]
async fn upsert_creates_then_updates() {
    let (_dir, pool) = common::test_pool().await;
    let repo = DeviceRepo::new(pool);
    let now = Utc::now();

    let first = repo.upsert(&record("192.168.1.10"), now).await.unwrap();
    assert!(first.created);

    let mut updated = record("192.168.1.10");
    updated.hostname = Some("printer-2f".into());
    updated.device_type = DeviceType::Printer;
    let second = repo.upsert(&updated, now + Duration::minutes(5)).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.id, first.id);

    let device = repo.get_by_ip("192.168.1.10").await.unwrap().unwrap();
    assert_eq!(device.hostname.as_deref(), Some("printer-2f"));
    assert_eq!(device.device_type, DeviceType::Printer);
    // created_at keeps the first sighting, last_seen moves forward
    assert_eq!(device.created_at, netaudit::db::from_ms(netaudit::db::to_ms(now)));
    assert!(device.last_seen > device.created_at);
}

#[tokio::test]
async fn upsert_never_deletes_other_rows() {
    let (_dir, pool) = common::test_pool().await;
    let repo = DeviceRepo::new(pool);
    let now = Utc::now();

    repo.upsert(&record("192.168.1.10"), now).await.unwrap();
    repo.upsert(&record("192.168.1.11"), now).await.unwrap();
    repo.upsert(&record("192.168.1.10"), now).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 2);
    let known = repo.known_ips().await.unwrap();
    assert!(known.contains("192.168.1.10"));
    assert!(known.contains("192.168.1.11"));
}

#[tokio::test]
async fn list_is_ordered_by_ip() {
    let (_dir, pool) = common::test_pool().await;
    let repo = DeviceRepo::new(pool);
    let now = Utc::now();

    for ip in ["192.168.1.30", "192.168.1.10", "192.168.1.20"] {
        repo.upsert(&record(ip), now).await.unwrap();
    }
    let ips: Vec<_> = repo.list().await.unwrap().into_iter().map(|d| d.ip).collect();
    assert_eq!(ips, vec!["192.168.1.10", "192.168.1.20", "192.168.1.30"]);
}

#[tokio::test]
async fn structured_detail_round_trips() {
    let (_dir, pool) = common::test_pool().await;
    let repo = DeviceRepo::new(pool);
    let now = Utc::now();

    let mut rec = record("192.168.1.50");
    rec.windows_detail = Some(WindowsDetail {
        hostname: Some("SRV-FILES".into()),
        os: "Microsoft Windows Server 2022".into(),
        disks: vec![DiskInfo {
            name: "C:".into(),
            size_gb: 500.0,
            free_gb: 120.5,
        }],
        errors: vec!["service spooler stopped".into()],
        ..WindowsDetail::default()
    });
    rec.errors = vec!["deep audit timed out after 15s".into()];
    repo.upsert(&rec, now).await.unwrap();

    let device = repo.get_by_ip("192.168.1.50").await.unwrap().unwrap();
    let detail = device.windows_detail.unwrap();
    assert_eq!(detail.hostname.as_deref(), Some("SRV-FILES"));
    assert_eq!(detail.disks[0].name, "C:");
    assert_eq!(device.errors.len(), 1);
}

#[tokio::test]
async fn online_flag_follows_last_seen() {
    let (_dir, pool) = common::test_pool().await;
    let repo = DeviceRepo::new(pool);
    let now = Utc::now();

    repo.upsert(&record("192.168.1.60"), now - Duration::minutes(10))
        .await
        .unwrap();
    repo.upsert(&record("192.168.1.61"), now - Duration::minutes(45))
        .await
        .unwrap();

    let devices = repo.list().await.unwrap();
    assert!(devices[0].is_online(now));
    assert!(!devices[1].is_online(now));
}
