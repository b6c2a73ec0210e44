// Subnet scan orchestration: discovery tiers, bounded audit fan-out,
// progress tracking. At most one subnet scan runs per process.

mod audit;
mod tracker;

pub use tracker::ScanTracker;

use crate::config::{ScanConfig, ScheduleConfig};
use crate::device_repo::DeviceRepo;
use crate::models::{Credentials, Device, SweepHost};
use crate::probe::{AuditTools, Prober};
use futures_util::FutureExt;
use futures_util::stream::StreamExt;
use ipnetwork::Ipv4Network;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum StartScanError {
    #[error("a scan is already running")]
    AlreadyRunning,
    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),
}

pub struct ScanEngine<P, T> {
    repo: Arc<DeviceRepo>,
    prober: Arc<P>,
    tools: Arc<T>,
    config: ScanConfig,
    credentials: Credentials,
    tracker: ScanTracker,
}

impl<P, T> Clone for ScanEngine<P, T> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            prober: Arc::clone(&self.prober),
            tools: Arc::clone(&self.tools),
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

impl<P: Prober, T: AuditTools> ScanEngine<P, T> {
    pub fn new(
        repo: Arc<DeviceRepo>,
        prober: Arc<P>,
        tools: Arc<T>,
        config: ScanConfig,
        credentials: Credentials,
    ) -> Self {
        Self {
            repo,
            prober,
            tools,
            config,
            credentials,
            tracker: ScanTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ScanTracker {
        &self.tracker
    }

    /// Starts a background scan of the subnet. Fails fast when one is
    /// already running; the winner holds the gate until it finishes.
    /// Credentials given here override the configured ones for this scan.
    pub fn start(
        &self,
        subnet: &str,
        credentials: Option<Credentials>,
    ) -> Result<(), StartScanError> {
        let net: Ipv4Network = subnet
            .parse()
            .map_err(|_| StartScanError::InvalidSubnet(subnet.to_string()))?;
        if !self.tracker.try_begin() {
            return Err(StartScanError::AlreadyRunning);
        }
        let mut engine = self.clone();
        if let Some(credentials) = credentials {
            engine.credentials = credentials;
        }
        tokio::spawn(async move {
            let result = AssertUnwindSafe(engine.run(net)).catch_unwind().await;
            if result.is_err() {
                engine.tracker.log("scan aborted by internal error");
                tracing::error!(subnet = %net, "scan task panicked");
            }
            // The gate is released on every exit path, panic included.
            engine.tracker.finish();
        });
        Ok(())
    }

    /// Cooperative stop; already-dispatched host audits still complete.
    pub fn request_stop(&self) {
        self.tracker.request_stop();
    }

    #[instrument(skip(self), fields(subnet = %net))]
    async fn run(&self, net: Ipv4Network) {
        self.tracker.log(&format!("scan started on {net}"));
        tracing::info!(subnet = %net, "scan started");

        let hosts = self.discover(net).await;
        if hosts.is_empty() {
            self.tracker.log("no live hosts found");
            tracing::info!(subnet = %net, "discovery found no hosts");
            return;
        }
        self.tracker.set_total(hosts.len() as u64);
        self.tracker
            .log(&format!("discovery found {} hosts, auditing", hosts.len()));

        if let Ok(known) = self.repo.known_ips().await {
            let unseen = hosts
                .iter()
                .filter(|h| !known.contains(&h.ip.to_string()))
                .count();
            if unseen > 0 {
                self.tracker
                    .log(&format!("{unseen} hosts not in inventory yet"));
            }
        }

        let audit_budget = Duration::from_secs(self.config.audit_timeout_secs);
        let mut stream = futures_util::stream::iter(hosts.into_iter().map(|host| {
            let ip = host.ip;
            async move {
                (
                    ip,
                    tokio::time::timeout(audit_budget, self.audit_host(host, true)).await,
                )
            }
        }))
        .buffer_unordered(self.config.audit_concurrency);

        let (mut added, mut updated) = (0u64, 0u64);
        while let Some((ip, outcome)) = stream.next().await {
            match outcome {
                Ok(Some(record)) => match self.repo.upsert(&record, chrono::Utc::now()).await {
                    Ok(r) if r.created => {
                        added += 1;
                        self.tracker.log(&format!("NEW {ip}"));
                    }
                    Ok(_) => updated += 1,
                    Err(e) => {
                        tracing::error!(ip = %ip, error = %e, "device upsert failed");
                        self.tracker.log(&format!("FAILED to save {ip}"));
                    }
                },
                Ok(None) => {
                    // Discovery saw it, the audit did not; leave the
                    // inventory untouched.
                    self.tracker.log(&format!("NO RESPONSE from {ip}"));
                }
                Err(_) => {
                    tracing::warn!(ip = %ip, "host audit exceeded budget, skipped");
                    self.tracker.log(&format!("TIMEOUT auditing {ip}"));
                }
            }
            self.tracker.host_done();

            if self.tracker.stop_requested() {
                self.tracker.log("scan stopped by request");
                tracing::info!(subnet = %net, "scan stopped by request");
                break;
            }
        }

        self.tracker.record_results(added, updated);
        self.tracker.log(&format!(
            "scan finished: {added} new, {updated} updated"
        ));
        tracing::info!(subnet = %net, added, updated, "scan finished");
    }

    /// Tier 1: external bulk sweep under a hard outer cap. Tier 2: native
    /// ping sweep when the tool is unavailable, fails or returns nothing.
    async fn discover(&self, net: Ipv4Network) -> Vec<SweepHost> {
        let cap = Duration::from_secs(self.config.sweep_timeout_secs);
        match tokio::time::timeout(cap, self.tools.sweep(net)).await {
            Ok(Ok(hosts)) if !hosts.is_empty() => {
                self.tracker
                    .log(&format!("bulk sweep found {} hosts", hosts.len()));
                return hosts;
            }
            Ok(Ok(_)) => {
                tracing::info!(subnet = %net, "bulk sweep returned nothing, using native sweep");
            }
            Ok(Err(e)) => {
                tracing::warn!(subnet = %net, error = %e, "bulk sweep unavailable, using native sweep");
            }
            Err(_) => {
                tracing::warn!(subnet = %net, "bulk sweep timed out, using native sweep");
            }
        }
        self.tracker.log("falling back to native ping sweep");
        self.ping_sweep(net).await
    }

    async fn ping_sweep(&self, net: Ipv4Network) -> Vec<SweepHost> {
        let timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let network = net.network();
        let broadcast = net.broadcast();
        let candidates: Vec<_> = net
            .iter()
            .filter(|ip| net.prefix() >= 31 || (*ip != network && *ip != broadcast))
            .take(self.config.max_hosts)
            .collect();

        let mut found: Vec<SweepHost> = futures_util::stream::iter(
            candidates.into_iter().map(|ip| async move {
                self.prober
                    .ping(ip, timeout)
                    .await
                    .map(|_| SweepHost { ip, hostname: None })
            }),
        )
        .buffer_unordered(self.config.discovery_concurrency)
        .filter_map(|r| async move { r })
        .collect()
        .await;
        found.sort_by_key(|h| h.ip);
        found
    }

    /// Audits one ip outside a subnet scan, persisting the result.
    #[instrument(skip(self), fields(ip = %ip))]
    pub async fn audit_single(&self, ip: std::net::Ipv4Addr) -> anyhow::Result<Device> {
        let budget = Duration::from_secs(self.config.audit_timeout_secs);
        let host = SweepHost { ip, hostname: None };
        let record = tokio::time::timeout(budget, self.audit_host(host, false))
            .await
            .map_err(|_| anyhow::anyhow!("audit of {ip} exceeded {}s", budget.as_secs()))?
            .ok_or_else(|| anyhow::anyhow!("{ip} did not respond to any probe"))?;
        self.repo.upsert(&record, chrono::Utc::now()).await?;
        self.repo
            .get_by_ip(&ip.to_string())
            .await?
            .ok_or_else(|| anyhow::anyhow!("device {ip} missing after upsert"))
    }
}

/// Periodic re-scan loop. Checks every 30s whether the configured interval
/// elapsed; a scan already in flight just postpones the next attempt.
pub fn spawn_scheduler<P: Prober, T: AuditTools>(
    engine: ScanEngine<P, T>,
    schedule: ScheduleConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(schedule.interval_minutes * 60);
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_run = tokio::time::Instant::now();
        tracing::info!(
            subnet = %schedule.subnet,
            interval_minutes = schedule.interval_minutes,
            "scan scheduler started"
        );
        loop {
            ticker.tick().await;
            if last_run.elapsed() < interval {
                continue;
            }
            match engine.start(&schedule.subnet, None) {
                Ok(()) => {
                    last_run = tokio::time::Instant::now();
                    tracing::info!(subnet = %schedule.subnet, "scheduled scan started");
                }
                Err(StartScanError::AlreadyRunning) => {
                    tracing::debug!("scan in progress, scheduled scan postponed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduled scan could not start");
                    last_run = tokio::time::Instant::now();
                }
            }
        }
    })
}
