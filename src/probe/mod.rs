// Network probing seams. The scan engine, sampler and IP advisor talk to the
// network through these traits so they can run against fakes in tests.

mod system;
mod tools;

pub use system::SystemProber;
pub use tools::{SystemAuditTools, ToolPaths};

use crate::models::{Credentials, PrinterDetail, SweepHost, WindowsDetail};
use ipnetwork::Ipv4Network;
use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Successful ICMP echo: round-trip latency plus the reply TTL used for
/// passive OS fingerprinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReply {
    pub latency: Duration,
    pub ttl: Option<u8>,
}

/// Per-drive usage as reported by the identification channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    pub name: String,
    pub used_percent: f64,
}

/// Health sample for one remote host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostMetrics {
    pub cpu_percent: Option<f64>,
    pub ram_percent: Option<f64>,
    pub disks: Vec<DiskUsage>,
}

/// Raw reachability probes.
pub trait Prober: Send + Sync + 'static {
    fn ping(
        &self,
        ip: Ipv4Addr,
        timeout: Duration,
    ) -> impl Future<Output = Option<PingReply>> + Send;

    fn tcp_probe(
        &self,
        ip: Ipv4Addr,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = bool> + Send;

    fn reverse_dns(&self, ip: Ipv4Addr) -> impl Future<Output = Option<String>> + Send;
}

/// External collaborators: bulk sweep, privileged identification, peripheral
/// telemetry, ARP table, OUI vendor database. Failures degrade to no data.
pub trait AuditTools: Send + Sync + 'static {
    /// High-throughput bulk sweep. Err covers both tool-unavailable and crash;
    /// the caller degrades to the native ping sweep.
    fn sweep(&self, subnet: Ipv4Network) -> impl Future<Output = anyhow::Result<Vec<SweepHost>>> + Send;

    /// Privileged deep audit of one host. Err is recorded in the device's
    /// errors list; it never invalidates liveness.
    fn deep_audit(
        &self,
        ip: Ipv4Addr,
        creds: &Credentials,
    ) -> impl Future<Output = anyhow::Result<WindowsDetail>> + Send;

    /// CPU/RAM/disk readout over the identification channel.
    fn host_metrics(
        &self,
        ip: Ipv4Addr,
        creds: &Credentials,
    ) -> impl Future<Output = Option<HostMetrics>> + Send;

    fn printer_telemetry(&self, ip: Ipv4Addr) -> impl Future<Output = Option<PrinterDetail>> + Send;

    /// Hardware address from the local ARP table.
    fn arp_lookup(&self, ip: Ipv4Addr) -> impl Future<Output = Option<String>> + Send;

    /// Manufacturer from the MAC OUI prefix; cached per prefix.
    fn vendor_lookup(&self, mac: &str) -> impl Future<Output = Option<String>> + Send;
}
