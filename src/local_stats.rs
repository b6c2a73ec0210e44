// Local host stats via sysinfo. The server machine is part of its own
// inventory; the sampler reads it here instead of probing the loopback.

use crate::probe::{DiskUsage, HostMetrics};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Disks, System};
use tracing::instrument;

pub struct LocalStats {
    sys: Arc<std::sync::Mutex<System>>,
    disks: Arc<std::sync::Mutex<Disks>>,
    last_cpu_refresh: Arc<std::sync::Mutex<Option<(Instant, f64)>>>,
}

impl Default for LocalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStats {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let disks = Disks::new_with_refreshed_list();
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
            disks: Arc::new(std::sync::Mutex::new(disks)),
            last_cpu_refresh: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    #[instrument(skip(self), fields(repo = "local_stats", operation = "sample"))]
    pub async fn sample(&self) -> anyhow::Result<HostMetrics> {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let last_cpu_refresh = self.last_cpu_refresh.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;

            let now = Instant::now();
            let cpu_percent = if let Ok(mut guard) = last_cpu_refresh.lock() {
                match *guard {
                    Some((prev_ts, prev_usage))
                        if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                    {
                        prev_usage
                    }
                    Some(_) => {
                        sys.refresh_cpu_all();
                        let usage = sys.global_cpu_usage() as f64;
                        *guard = Some((now, usage));
                        usage
                    }
                    None => {
                        // First call establishes the baseline
                        sys.refresh_cpu_all();
                        *guard = Some((now, 0.0));
                        0.0
                    }
                }
            } else {
                sys.refresh_cpu_all();
                0.0
            };

            sys.refresh_memory();
            let total = sys.total_memory();
            let ram_percent = if total > 0 {
                sys.used_memory() as f64 / total as f64 * 100.0
            } else {
                0.0
            };

            let mut disk_usage = Vec::new();
            if let Ok(mut disks) = disks.lock() {
                disks.refresh(true);
                for disk in disks.list() {
                    let total = disk.total_space();
                    if total == 0 {
                        continue;
                    }
                    let used = total.saturating_sub(disk.available_space());
                    disk_usage.push(DiskUsage {
                        name: disk.mount_point().to_string_lossy().into_owned(),
                        used_percent: used as f64 / total as f64 * 100.0,
                    });
                }
            }

            Ok(HostMetrics {
                cpu_percent: Some(cpu_percent),
                ram_percent: Some(ram_percent),
                disks: disk_usage,
            })
        })
        .await?
    }
}
