// Background monitoring loop: samples every known device on an interval,
// stores the metrics and feeds each sample through the trigger engine.

use crate::alert_engine::AlertEngine;
use crate::device_repo::DeviceRepo;
use crate::local_stats::LocalStats;
use crate::metric_repo::MetricRepo;
use crate::models::{Credentials, Device, DeviceType, MetricSample};
use crate::probe::{AuditTools, HostMetrics, Prober};
use futures_util::stream::StreamExt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::time::{Duration, Instant, interval};

const SAMPLE_PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Repos, probes and shutdown for the sampler.
pub struct SamplerDeps<P, T> {
    pub device_repo: Arc<DeviceRepo>,
    pub metric_repo: Arc<MetricRepo>,
    pub alert_engine: Arc<AlertEngine>,
    pub prober: Arc<P>,
    pub tools: Arc<T>,
    pub local_stats: Arc<LocalStats>,
    pub credentials: Credentials,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Sampler timing config. Pruning runs on its own real-time interval.
pub struct SamplerConfig {
    pub sample_interval_secs: u64,
    pub device_concurrency: usize,
    pub prune_interval_secs: u64,
}

pub fn spawn<P: Prober, T: AuditTools>(
    deps: SamplerDeps<P, T>,
    config: SamplerConfig,
) -> tokio::task::JoinHandle<()> {
    let SamplerDeps {
        device_repo,
        metric_repo,
        alert_engine,
        prober,
        tools,
        local_stats,
        credentials,
        mut shutdown_rx,
    } = deps;

    let sample_interval = Duration::from_secs(config.sample_interval_secs);
    let prune_interval = Duration::from_secs(config.prune_interval_secs);
    let device_concurrency = config.device_concurrency.max(1);

    tokio::spawn(async move {
        let mut tick = interval(sample_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut prune_tick = interval(prune_interval);
        prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let span = tracing::span!(
            tracing::Level::DEBUG,
            "sampler",
            interval_secs = config.sample_interval_secs
        );
        let _guard = span.enter();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // One cycle never outlives its interval; stragglers are
                    // abandoned and retried next cycle.
                    let deadline = Instant::now() + sample_interval;
                    let cycle = run_cycle(
                        &device_repo,
                        &metric_repo,
                        &alert_engine,
                        prober.as_ref(),
                        tools.as_ref(),
                        &local_stats,
                        &credentials,
                        device_concurrency,
                    );
                    if tokio::time::timeout_at(deadline, cycle).await.is_err() {
                        tracing::warn!("sampling cycle overran its interval, cut short");
                    }
                }
                _ = prune_tick.tick() => {
                    match metric_repo.prune_old_data().await {
                        Ok(n) if n > 0 => {
                            tracing::info!(rows = n, operation = "prune_old_data", "old metrics pruned");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, operation = "prune_old_data", "metric pruning failed");
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("sampler shutting down");
                    break;
                }
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_cycle<P: Prober, T: AuditTools>(
    device_repo: &DeviceRepo,
    metric_repo: &MetricRepo,
    alert_engine: &AlertEngine,
    prober: &P,
    tools: &T,
    local_stats: &LocalStats,
    credentials: &Credentials,
    device_concurrency: usize,
) {
    let devices = match device_repo.list().await {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "could not list devices, cycle skipped");
            return;
        }
    };
    if devices.is_empty() {
        return;
    }
    let started = Instant::now();
    let total = devices.len();

    // One bad device never aborts the cycle.
    let sampled: usize = futures_util::stream::iter(devices.into_iter().map(|device| async move {
        match sample_device(prober, tools, local_stats, credentials, &device).await {
            Some(samples) if !samples.is_empty() => {
                store_samples(metric_repo, alert_engine, &device, samples).await;
                1
            }
            _ => 0,
        }
    }))
    .buffer_unordered(device_concurrency)
    .fold(0usize, |acc, n| async move { acc + n })
    .await;

    tracing::debug!(
        total,
        sampled,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sampling cycle finished"
    );
}

/// Collects this device's metrics. None means unreachable this cycle.
async fn sample_device<P: Prober, T: AuditTools>(
    prober: &P,
    tools: &T,
    local_stats: &LocalStats,
    credentials: &Credentials,
    device: &Device,
) -> Option<Vec<(String, f64, &'static str)>> {
    let ip: Ipv4Addr = device.ip.parse().ok()?;
    let mut samples: Vec<(String, f64, &'static str)> = Vec::new();

    if ip.is_loopback() {
        // The server samples itself locally instead of over the network.
        match local_stats.sample().await {
            Ok(metrics) => push_host_metrics(&mut samples, metrics),
            Err(e) => tracing::warn!(error = %e, "local stats unavailable"),
        }
        return Some(samples);
    }

    let reply = prober.ping(ip, SAMPLE_PING_TIMEOUT).await?;
    samples.push((
        "latency".to_string(),
        reply.latency.as_secs_f64() * 1000.0,
        "ms",
    ));

    match device.device_type {
        DeviceType::Windows | DeviceType::ServerWindows if !credentials.is_empty() => {
            if let Some(metrics) = tools.host_metrics(ip, credentials).await {
                push_host_metrics(&mut samples, metrics);
            }
        }
        DeviceType::Printer => {
            if let Some(detail) = tools.printer_telemetry(ip).await {
                for supply in &detail.supplies {
                    if supply.level >= 0 {
                        samples.push((
                            format!("toner_{}", metric_key(&supply.name)),
                            supply.level as f64,
                            "%",
                        ));
                    }
                }
                if let Some(pages) = detail.page_count {
                    samples.push(("page_count".to_string(), pages as f64, "pages"));
                }
            }
        }
        _ => {}
    }

    Some(samples)
}

fn push_host_metrics(samples: &mut Vec<(String, f64, &'static str)>, metrics: HostMetrics) {
    if let Some(cpu) = metrics.cpu_percent {
        samples.push(("cpu_usage".to_string(), cpu, "%"));
    }
    if let Some(ram) = metrics.ram_percent {
        samples.push(("ram_usage".to_string(), ram, "%"));
    }
    for disk in metrics.disks {
        samples.push((
            format!("disk_usage_{}", metric_key(&disk.name)),
            disk.used_percent,
            "%",
        ));
    }
}

/// Normalizes a free-form name into a metric type suffix.
fn metric_key(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

async fn store_samples(
    metric_repo: &MetricRepo,
    alert_engine: &AlertEngine,
    device: &Device,
    samples: Vec<(String, f64, &'static str)>,
) {
    let now = chrono::Utc::now();
    for (metric_type, value, unit) in samples {
        let sample = MetricSample::new(device.id, metric_type.clone(), value, unit, now);
        if let Err(e) = metric_repo.record(&sample).await {
            tracing::warn!(device_id = device.id, metric = %metric_type, error = %e, "metric write failed");
            continue;
        }
        if let Err(e) = alert_engine.process_sample(device, &metric_type, value, now).await {
            tracing::warn!(device_id = device.id, metric = %metric_type, error = %e, "trigger evaluation failed");
        }
    }
}
