// External collaborator tools, invoked as black boxes over JSON stdout.
// Every failure here degrades to "no data"; none of it may abort a scan.

use super::{AuditTools, DiskUsage, HostMetrics};
use crate::models::{Credentials, PrinterDetail, SweepHost, WindowsDetail};
use anyhow::Context;
use ipnetwork::Ipv4Network;
use mac_oui::Oui;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::{Mutex, OnceLock};
use tokio::process::Command;

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB.get_or_init(|| Oui::default().ok()).as_ref()
}

/// Paths to the external executables. None disables that tier.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    pub sweep_tool: Option<String>,
    pub deep_audit_tool: Option<String>,
    pub printer_telemetry_tool: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SweepLine {
    #[serde(alias = "IP")]
    ip: String,
    #[serde(alias = "Hostname", default)]
    hostname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostMetricsLine {
    #[serde(default)]
    cpu_percent: Option<f64>,
    #[serde(default)]
    ram_percent: Option<f64>,
    #[serde(default)]
    disks: Vec<DiskUsageLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskUsageLine {
    name: String,
    used_percent: f64,
}

pub struct SystemAuditTools {
    paths: ToolPaths,
    /// Vendor results cached by OUI prefix for the process lifetime.
    vendor_cache: Mutex<HashMap<String, Option<String>>>,
}

impl SystemAuditTools {
    pub fn new(paths: ToolPaths) -> Self {
        Self {
            paths,
            vendor_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn run_json_tool<T: serde::de::DeserializeOwned>(
        cmd: &mut Command,
    ) -> anyhow::Result<T> {
        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("tool spawn failed")?;
        anyhow::ensure!(
            output.status.success(),
            "tool exited with {}",
            output.status
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        // Tools may print banners; take the first JSON payload on the output.
        let start = stdout
            .find(['[', '{'])
            .context("no JSON payload in tool output")?;
        let parsed = serde_json::from_str(stdout[start..].trim())
            .context("tool output is not valid JSON")?;
        Ok(parsed)
    }
}

impl AuditTools for SystemAuditTools {
    async fn sweep(&self, subnet: Ipv4Network) -> anyhow::Result<Vec<SweepHost>> {
        let tool = self
            .paths
            .sweep_tool
            .as_deref()
            .context("sweep tool not configured")?;
        let lines: Vec<SweepLine> = Self::run_json_tool(
            Command::new(tool).arg("--subnet").arg(subnet.to_string()),
        )
        .await?;
        Ok(lines
            .into_iter()
            .filter_map(|l| {
                let ip = l.ip.parse().ok()?;
                let hostname = l.hostname.filter(|h| !h.is_empty() && h != "N/A");
                Some(SweepHost { ip, hostname })
            })
            .collect())
    }

    async fn deep_audit(&self, ip: Ipv4Addr, creds: &Credentials) -> anyhow::Result<WindowsDetail> {
        let tool = self
            .paths
            .deep_audit_tool
            .as_deref()
            .context("deep audit tool not configured")?;
        // Password travels via the environment, never argv.
        Self::run_json_tool(
            Command::new(tool)
                .arg("--ip")
                .arg(ip.to_string())
                .arg("--user")
                .arg(&creds.username)
                .env("NETAUDIT_SCAN_PASS", &creds.password),
        )
        .await
    }

    async fn host_metrics(&self, ip: Ipv4Addr, creds: &Credentials) -> Option<HostMetrics> {
        let tool = self.paths.deep_audit_tool.as_deref()?;
        let line: HostMetricsLine = match Self::run_json_tool(
            Command::new(tool)
                .arg("--ip")
                .arg(ip.to_string())
                .arg("--user")
                .arg(&creds.username)
                .arg("--metrics")
                .env("NETAUDIT_SCAN_PASS", &creds.password),
        )
        .await
        {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "host metrics query failed");
                return None;
            }
        };
        Some(HostMetrics {
            cpu_percent: line.cpu_percent,
            ram_percent: line.ram_percent,
            disks: line
                .disks
                .into_iter()
                .map(|d| DiskUsage {
                    name: d.name,
                    used_percent: d.used_percent,
                })
                .collect(),
        })
    }

    async fn printer_telemetry(&self, ip: Ipv4Addr) -> Option<PrinterDetail> {
        let tool = self.paths.printer_telemetry_tool.as_deref()?;
        match Self::run_json_tool(Command::new(tool).arg("--ip").arg(ip.to_string())).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "printer telemetry failed");
                None
            }
        }
    }

    async fn arp_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        match tokio::fs::read_to_string("/proc/net/arp").await {
            Ok(table) => parse_proc_arp(&table, ip),
            Err(e) => {
                tracing::debug!(error = %e, "ARP table unavailable");
                None
            }
        }
    }

    async fn vendor_lookup(&self, mac: &str) -> Option<String> {
        let prefix: String = mac.chars().take(8).collect::<String>().to_uppercase();
        if let Ok(cache) = self.vendor_cache.lock()
            && let Some(cached) = cache.get(&prefix)
        {
            return cached.clone();
        }
        let vendor = oui_db()
            .and_then(|db| db.lookup_by_mac(mac).ok().flatten())
            .map(|entry| entry.company_name.clone());
        if let Ok(mut cache) = self.vendor_cache.lock() {
            cache.insert(prefix, vendor.clone());
        }
        vendor
    }
}

/// /proc/net/arp: "IP address  HW type  Flags  HW address  Mask  Device"
fn parse_proc_arp(table: &str, ip: Ipv4Addr) -> Option<String> {
    let ip_str = ip.to_string();
    for line in table.lines().skip(1) {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(ip_str.as_str()) {
            continue;
        }
        let mac = fields.nth(2)?;
        if mac == "00:00:00:00:00:00" {
            return None;
        }
        return Some(mac.to_uppercase());
    }
    None
}
