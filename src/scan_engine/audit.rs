// Per-host audit: liveness, fingerprinting, identification, enrichment.
// Everything here degrades; a failed collaborator becomes a note in the
// device's errors list, never a lost host.

use super::ScanEngine;
use crate::classifier::{self, PortSignals, PRINTER_PORTS, RTSP_PORT, SSH_PORT, WEB_PORTS};
use crate::models::{DeviceRecord, DeviceType, SweepHost, WindowsDetail};
use crate::probe::{AuditTools, Prober};
use std::net::Ipv4Addr;
use std::time::Duration;

const AUDIT_PING_TIMEOUT: Duration = Duration::from_secs(1);
const AUDIT_PING_ATTEMPTS: u32 = 2;
const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// Liveness fallback for hosts that drop ICMP, most common first.
const TCP_FALLBACK_PORTS: [u16; 8] = [9100, 80, 443, 445, 139, 135, 22, 3389];

impl<P: Prober, T: AuditTools> ScanEngine<P, T> {
    /// Full audit of one host. `known_alive` marks hosts discovery already
    /// confirmed; for those the audit proceeds even when every probe here
    /// comes back empty. For unconfirmed hosts a fully silent target yields
    /// None and nothing is stored.
    pub(super) async fn audit_host(
        &self,
        host: SweepHost,
        known_alive: bool,
    ) -> Option<DeviceRecord> {
        let ip = host.ip;
        let mut record = DeviceRecord::new(ip.to_string());

        // Ping even for hosts the bulk sweep already confirmed: the reply
        // TTL feeds the OS fingerprint.
        let mut ttl = None;
        for _ in 0..AUDIT_PING_ATTEMPTS {
            if let Some(reply) = self.prober.ping(ip, AUDIT_PING_TIMEOUT).await {
                ttl = reply.ttl;
                break;
            }
        }
        if ttl.is_none() {
            // ICMP-silent host; confirm it answers on something before the
            // heavier steps. First open port wins.
            let mut reachable = false;
            for port in TCP_FALLBACK_PORTS {
                if self.prober.tcp_probe(ip, port, PORT_PROBE_TIMEOUT).await {
                    reachable = true;
                    break;
                }
            }
            if !reachable && !known_alive {
                tracing::debug!(ip = %ip, "host silent on ICMP and fallback ports");
                return None;
            }
        }

        let ident = self.try_deep_audit(ip, ttl, &mut record.errors).await;

        // Port fingerprinting only matters when identification failed;
        // an authoritative ident outranks every passive signal.
        let signals = if ident.is_some() {
            PortSignals::default()
        } else {
            self.port_signals(ip).await
        };

        let class = classifier::classify(ident.as_ref(), ttl, signals);
        record.device_type = class.device_type;
        record.icon = class.icon.to_string();
        record.confidence = class.confidence.to_string();

        record.os_detail = ident
            .as_ref()
            .map(|d| d.os.clone())
            .or_else(|| ttl.and_then(classifier::os_guess_from_ttl).map(String::from));

        record.hostname = ident
            .as_ref()
            .and_then(|d| d.hostname.clone())
            .or(host.hostname);
        if record.hostname.is_none() {
            record.hostname = self.prober.reverse_dns(ip).await;
        }

        record.mac = self.tools.arp_lookup(ip).await;
        if let Some(mac) = &record.mac {
            record.vendor = self.tools.vendor_lookup(mac).await;
        }
        record.windows_detail = ident;

        if record.device_type == DeviceType::Printer {
            self.enrich_printer(ip, &mut record).await;
        }
        Some(record)
    }

    /// Privileged identification, gated on a Windows-band TTL and configured
    /// credentials. Failure lands in the errors list.
    async fn try_deep_audit(
        &self,
        ip: Ipv4Addr,
        ttl: Option<u8>,
        errors: &mut Vec<String>,
    ) -> Option<WindowsDetail> {
        let windows_band = ttl.is_some_and(|t| (120..=130).contains(&t));
        if !windows_band || self.credentials.is_empty() {
            return None;
        }
        let budget = Duration::from_secs(self.config.deep_audit_timeout_secs);
        match tokio::time::timeout(budget, self.tools.deep_audit(ip, &self.credentials)).await {
            Ok(Ok(detail)) => Some(detail),
            Ok(Err(e)) => {
                tracing::debug!(ip = %ip, error = %e, "deep audit failed");
                errors.push(format!("deep audit failed: {e}"));
                None
            }
            Err(_) => {
                tracing::debug!(ip = %ip, "deep audit timed out");
                errors.push(format!(
                    "deep audit timed out after {}s",
                    budget.as_secs()
                ));
                None
            }
        }
    }

    async fn port_signals(&self, ip: Ipv4Addr) -> PortSignals {
        let printer = async {
            for port in PRINTER_PORTS {
                if self.prober.tcp_probe(ip, port, PORT_PROBE_TIMEOUT).await {
                    return true;
                }
            }
            false
        };
        let web = async {
            for port in WEB_PORTS {
                if self.prober.tcp_probe(ip, port, PORT_PROBE_TIMEOUT).await {
                    return true;
                }
            }
            false
        };
        let rtsp = self.prober.tcp_probe(ip, RTSP_PORT, PORT_PROBE_TIMEOUT);
        let ssh = self.prober.tcp_probe(ip, SSH_PORT, PORT_PROBE_TIMEOUT);
        let (printer, rtsp, ssh, web) = tokio::join!(printer, rtsp, ssh, web);
        PortSignals {
            printer,
            rtsp,
            ssh,
            web,
        }
    }

    /// Peripheral telemetry overrides the generic fields when present.
    async fn enrich_printer(&self, ip: Ipv4Addr, record: &mut DeviceRecord) {
        let Some(detail) = self.tools.printer_telemetry(ip).await else {
            return;
        };
        if detail.hostname.is_some() {
            record.hostname = detail.hostname.clone();
        }
        if let Some(model) = &detail.model {
            record.os_detail = Some(model.clone());
        }
        record.serial = detail.serial.clone();
        record.location = detail.location.clone();
        if let Some(error_state) = &detail.error_state {
            record.errors.push(format!("printer error: {error_state}"));
        }
        record.printer_detail = Some(detail);
    }
}
