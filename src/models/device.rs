// Device inventory models: one row per IP, upsert-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Freshness window for the derived online/offline status. The read paths and
/// the IP map share this single cutoff.
pub const ONLINE_CUTOFF_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Windows,
    ServerWindows,
    Linux,
    Printer,
    Camera,
    WebDevice,
    WindowsLocked,
    Network,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Windows => "windows",
            DeviceType::ServerWindows => "server_windows",
            DeviceType::Linux => "linux",
            DeviceType::Printer => "printer",
            DeviceType::Camera => "camera",
            DeviceType::WebDevice => "web_device",
            DeviceType::WindowsLocked => "windows_locked",
            DeviceType::Network => "network",
            DeviceType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "windows" => DeviceType::Windows,
            "server_windows" => DeviceType::ServerWindows,
            "linux" => DeviceType::Linux,
            "printer" => DeviceType::Printer,
            "camera" => DeviceType::Camera,
            "web_device" => DeviceType::WebDevice,
            "windows_locked" => DeviceType::WindowsLocked,
            "network" => DeviceType::Network,
            _ => DeviceType::Unknown,
        }
    }
}

/// Output of the classification heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub device_type: DeviceType,
    pub icon: &'static str,
    pub confidence: &'static str,
}

/// Privileged credentials for the deep-audit channel.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Empty credentials disable the deep-audit channel.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShareInfo {
    pub name: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub name: String,
    #[serde(default)]
    pub size_gb: f64,
    #[serde(default)]
    pub free_gb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NicInfo {
    pub name: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub ip: String,
}

/// Structured payload produced by the privileged deep-audit tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowsDetail {
    #[serde(default)]
    pub hostname: Option<String>,
    pub os: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub logged_user: Option<String>,
    #[serde(default)]
    pub ram: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub bios: Option<String>,
    #[serde(default)]
    pub shares: Vec<ShareInfo>,
    #[serde(default)]
    pub disks: Vec<DiskInfo>,
    #[serde(default)]
    pub nics: Vec<NicInfo>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrinterSupply {
    pub name: String,
    /// Percentage 0-100, or -1 when the device reports no usable capacity.
    pub level: i32,
}

/// Telemetry block reported by the peripheral (SNMP-like) tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDetail {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_state: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub page_count: Option<u64>,
    #[serde(default)]
    pub supplies: Vec<PrinterSupply>,
}

/// A device as read from the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub ip: String,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub device_type: DeviceType,
    pub icon: String,
    pub vendor: Option<String>,
    pub confidence: String,
    pub os_detail: Option<String>,
    pub serial: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub windows_detail: Option<WindowsDetail>,
    pub printer_detail: Option<PrinterDetail>,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Derived, never stored: a device is online iff seen within the cutoff.
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_seen) <= chrono::Duration::minutes(ONLINE_CUTOFF_MINUTES)
    }

    pub fn display_name(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.ip)
    }
}

/// A completed audit result, ready to upsert. The repository assigns id,
/// created_at and last_seen.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub ip: String,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub device_type: DeviceType,
    pub icon: String,
    pub vendor: Option<String>,
    pub confidence: String,
    pub os_detail: Option<String>,
    pub serial: Option<String>,
    pub location: Option<String>,
    pub errors: Vec<String>,
    pub windows_detail: Option<WindowsDetail>,
    pub printer_detail: Option<PrinterDetail>,
}

impl DeviceRecord {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hostname: None,
            mac: None,
            device_type: DeviceType::Unknown,
            icon: "ph-globe".into(),
            vendor: None,
            confidence: "Baixa".into(),
            os_detail: None,
            serial: None,
            location: None,
            errors: Vec::new(),
            windows_detail: None,
            printer_detail: None,
        }
    }
}
