use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scan: ScanConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    #[serde(default = "default_retention_days")]
    pub metric_retention_days: u32,
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_discovery_concurrency")]
    pub discovery_concurrency: usize,
    /// Per-probe timeout during the native ping sweep.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Hard outer cap on the external sweep tool, independent of its own timeouts.
    #[serde(default = "default_sweep_timeout_secs")]
    pub sweep_timeout_secs: u64,
    #[serde(default = "default_audit_concurrency")]
    pub audit_concurrency: usize,
    /// Budget for one host's full audit; over-budget hosts are dropped this cycle.
    #[serde(default = "default_audit_timeout_secs")]
    pub audit_timeout_secs: u64,
    #[serde(default = "default_deep_audit_timeout_secs")]
    pub deep_audit_timeout_secs: u64,
    /// Safety cap on addresses probed by the native sweep.
    #[serde(default = "default_max_hosts")]
    pub max_hosts: usize,
}

fn default_discovery_concurrency() -> usize {
    64
}
fn default_probe_timeout_ms() -> u64 {
    200
}
fn default_sweep_timeout_secs() -> u64 {
    180
}
fn default_audit_concurrency() -> usize {
    8
}
fn default_audit_timeout_secs() -> u64 {
    60
}
fn default_deep_audit_timeout_secs() -> u64 {
    15
}
fn default_max_hosts() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub sample_interval_secs: u64,
    /// Devices sampled concurrently per cycle.
    #[serde(default = "default_device_concurrency")]
    pub device_concurrency: usize,
    /// How often to prune metrics past retention (real seconds).
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_device_concurrency() -> usize {
    25
}
fn default_prune_interval_secs() -> u64 {
    3600
}

/// Periodic re-scan of a fixed subnet. Skipped while a scan is running.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub subnet: String,
    #[serde(default = "default_schedule_interval")]
    pub interval_minutes: u64,
}

fn default_schedule_interval() -> u64 {
    60
}

/// External tool paths. An unset path disables that tier; the scan engine
/// degrades to the native probes.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsConfig {
    pub sweep_tool: Option<String>,
    pub deep_audit_tool: Option<String>,
    pub printer_telemetry_tool: Option<String>,
}

/// Privileged credentials for the deep-audit channel. Empty disables it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.metric_retention_days > 0,
            "database.metric_retention_days must be > 0, got {}",
            self.database.metric_retention_days
        );
        anyhow::ensure!(
            self.scan.discovery_concurrency > 0,
            "scan.discovery_concurrency must be > 0, got {}",
            self.scan.discovery_concurrency
        );
        anyhow::ensure!(
            self.scan.audit_concurrency > 0,
            "scan.audit_concurrency must be > 0, got {}",
            self.scan.audit_concurrency
        );
        anyhow::ensure!(
            self.scan.probe_timeout_ms > 0,
            "scan.probe_timeout_ms must be > 0, got {}",
            self.scan.probe_timeout_ms
        );
        anyhow::ensure!(
            self.scan.max_hosts > 0,
            "scan.max_hosts must be > 0, got {}",
            self.scan.max_hosts
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_secs > 0,
            "monitoring.sample_interval_secs must be > 0, got {}",
            self.monitoring.sample_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.device_concurrency > 0,
            "monitoring.device_concurrency must be > 0, got {}",
            self.monitoring.device_concurrency
        );
        if self.schedule.enabled {
            anyhow::ensure!(
                !self.schedule.subnet.is_empty(),
                "schedule.subnet must be set when schedule.enabled is true"
            );
            anyhow::ensure!(
                self.schedule.interval_minutes > 0,
                "schedule.interval_minutes must be > 0, got {}",
                self.schedule.interval_minutes
            );
        }
        Ok(())
    }
}
