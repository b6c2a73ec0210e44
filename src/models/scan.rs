// Scan status snapshot and IP inventory models

use crate::models::DeviceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// One host found during the discovery phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepHost {
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanLogEntry {
    pub msg: String,
    /// HH:MM:SS wall-clock, for display only.
    pub time: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastResults {
    pub added: u64,
    pub updated: u64,
    pub total_found: u64,
}

/// Read-only snapshot of scan progress, taken under the tracker lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub running: bool,
    pub scanned: u64,
    pub total: u64,
    pub etr: String,
    pub logs: Vec<ScanLogEntry>,
    pub last_results: LastResults,
}

impl ScanStatus {
    /// Percentage complete, capped at 100.
    pub fn progress(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.scanned * 100 / self.total).min(100) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpStatus {
    /// Seen within the online cutoff.
    Online,
    /// Seen within the days threshold but not recently.
    InUse,
    /// Known but stale past the days threshold.
    ProbablyFree,
    /// Never observed.
    Free,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapEntry {
    pub ip: String,
    pub status: IpStatus,
    pub hostname: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_seen_days: Option<i64>,
    pub mac: Option<String>,
    pub device_type: Option<DeviceType>,
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapStats {
    pub total: u64,
    pub free: u64,
    pub probably_free: u64,
    pub in_use: u64,
    pub online: u64,
    pub subnet: String,
    pub days_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpMap {
    pub ips: Vec<IpMapEntry>,
    pub stats: IpMapStats,
}
