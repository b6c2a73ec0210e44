// Config parsing and validation

use netaudit::config::AppConfig;

const VALID_CONFIG: &str = r#"
[server]
port = 8090
host = "0.0.0.0"

[database]
path = "data/netaudit.db"
max_pool_size = 4

[scan]
audit_concurrency = 8

[monitoring]
sample_interval_secs = 60
"#;

#[test]
fn valid_config_parses_with_defaults() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    assert_eq!(config.server.port, 8090);
    assert_eq!(config.database.metric_retention_days, 30);
    assert_eq!(config.scan.discovery_concurrency, 64);
    assert_eq!(config.scan.probe_timeout_ms, 200);
    assert_eq!(config.scan.audit_timeout_secs, 60);
    assert_eq!(config.scan.max_hosts, 1024);
    assert_eq!(config.monitoring.device_concurrency, 25);
    assert!(!config.schedule.enabled);
    assert!(config.credentials.username.is_empty());
    assert!(config.tools.sweep_tool.is_none());
}

#[test]
fn zero_pool_size_is_rejected() {
    let s = VALID_CONFIG.replace("max_pool_size = 4", "max_pool_size = 0");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("max_pool_size"));
}

#[test]
fn zero_audit_concurrency_is_rejected() {
    let s = VALID_CONFIG.replace("audit_concurrency = 8", "audit_concurrency = 0");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("audit_concurrency"));
}

#[test]
fn schedule_requires_subnet() {
    let s = format!("{VALID_CONFIG}\n[schedule]\nenabled = true\n");
    let err = AppConfig::load_from_str(&s).unwrap_err();
    assert!(err.to_string().contains("schedule.subnet"));
}

#[test]
fn schedule_with_subnet_is_accepted() {
    let s = format!(
        "{VALID_CONFIG}\n[schedule]\nenabled = true\nsubnet = \"192.168.1.0/24\"\n"
    );
    let config = AppConfig::load_from_str(&s).unwrap();
    assert_eq!(config.schedule.interval_minutes, 60);
}

#[test]
fn tools_section_is_optional_per_tool() {
    let s = format!("{VALID_CONFIG}\n[tools]\nsweep_tool = \"/usr/local/bin/netsweep\"\n");
    let config = AppConfig::load_from_str(&s).unwrap();
    assert_eq!(
        config.tools.sweep_tool.as_deref(),
        Some("/usr/local/bin/netsweep")
    );
    assert!(config.tools.deep_audit_tool.is_none());
}
