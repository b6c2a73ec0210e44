// Shared test helpers: temp database and scriptable network fakes.

#![allow(dead_code)]

use netaudit::models::*;
use netaudit::probe::{AuditTools, HostMetrics, PingReply, Prober};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;
use tempfile::TempDir;

pub async fn test_pool() -> (TempDir, sqlx::SqlitePool) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("netaudit.db");
    let pool = netaudit::db::connect(path.to_str().unwrap(), 2)
        .await
        .unwrap();
    netaudit::db::init(&pool).await.unwrap();
    (dir, pool)
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Scriptable network: which hosts answer pings (and with what TTL), which
/// ports are open, which names resolve.
#[derive(Debug, Clone, Default)]
pub struct FakeNet {
    pub alive: HashMap<Ipv4Addr, u8>,
    pub open_ports: HashSet<(Ipv4Addr, u16)>,
    pub rdns: HashMap<Ipv4Addr, String>,
    /// Per-ping delay, for tests that need a scan to stay in flight.
    pub ping_delay_ms: u64,
}

impl FakeNet {
    pub fn host(mut self, ip_str: &str, ttl: u8) -> Self {
        self.alive.insert(ip(ip_str), ttl);
        self
    }

    pub fn port(mut self, ip_str: &str, port: u16) -> Self {
        self.open_ports.insert((ip(ip_str), port));
        self
    }

    pub fn name(mut self, ip_str: &str, hostname: &str) -> Self {
        self.rdns.insert(ip(ip_str), hostname.to_string());
        self
    }

    pub fn slow(mut self, ping_delay_ms: u64) -> Self {
        self.ping_delay_ms = ping_delay_ms;
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeProber {
    pub net: FakeNet,
}

impl FakeProber {
    pub fn new(net: FakeNet) -> Self {
        Self { net }
    }
}

impl Prober for FakeProber {
    async fn ping(&self, ip: Ipv4Addr, _timeout: Duration) -> Option<PingReply> {
        if self.net.ping_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.net.ping_delay_ms)).await;
        }
        self.net.alive.get(&ip).map(|ttl| PingReply {
            latency: Duration::from_millis(5),
            ttl: Some(*ttl),
        })
    }

    async fn tcp_probe(&self, ip: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        self.net.open_ports.contains(&(ip, port))
    }

    async fn reverse_dns(&self, ip: Ipv4Addr) -> Option<String> {
        self.net.rdns.get(&ip).cloned()
    }
}

/// Scriptable collaborator tools. sweep_hosts None plays an unavailable
/// bulk sweep tool, forcing the native sweep fallback.
#[derive(Debug, Default)]
pub struct FakeTools {
    pub sweep_hosts: Option<Vec<SweepHost>>,
    pub deep_audit: HashMap<Ipv4Addr, WindowsDetail>,
    pub host_metrics: HashMap<Ipv4Addr, HostMetrics>,
    pub printers: HashMap<Ipv4Addr, PrinterDetail>,
    pub arp: HashMap<Ipv4Addr, String>,
    pub vendors: HashMap<String, String>,
}

impl AuditTools for FakeTools {
    async fn sweep(&self, _subnet: ipnetwork::Ipv4Network) -> anyhow::Result<Vec<SweepHost>> {
        self.sweep_hosts
            .clone()
            .ok_or_else(|| anyhow::anyhow!("sweep tool unavailable"))
    }

    async fn deep_audit(
        &self,
        ip: Ipv4Addr,
        _creds: &Credentials,
    ) -> anyhow::Result<WindowsDetail> {
        self.deep_audit
            .get(&ip)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("access denied"))
    }

    async fn host_metrics(&self, ip: Ipv4Addr, _creds: &Credentials) -> Option<HostMetrics> {
        self.host_metrics.get(&ip).cloned()
    }

    async fn printer_telemetry(&self, ip: Ipv4Addr) -> Option<PrinterDetail> {
        self.printers.get(&ip).cloned()
    }

    async fn arp_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        self.arp.get(&ip).cloned()
    }

    async fn vendor_lookup(&self, mac: &str) -> Option<String> {
        self.vendors.get(mac).cloned()
    }
}

pub fn scan_config() -> netaudit::config::ScanConfig {
    netaudit::config::ScanConfig {
        discovery_concurrency: 8,
        probe_timeout_ms: 50,
        sweep_timeout_secs: 5,
        audit_concurrency: 4,
        audit_timeout_secs: 5,
        deep_audit_timeout_secs: 2,
        max_hosts: 64,
    }
}

pub fn windows_detail(os: &str, hostname: Option<&str>) -> WindowsDetail {
    WindowsDetail {
        hostname: hostname.map(String::from),
        os: os.to_string(),
        ..WindowsDetail::default()
    }
}
