// Metric time series: append-only, never updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub device_id: i64,
    /// e.g. cpu_usage, ram_usage, disk_usage_<drive>, latency, toner_<name>, page_count
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        device_id: i64,
        metric_type: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id,
            metric_type: metric_type.into(),
            value,
            unit: unit.into(),
            timestamp,
        }
    }
}
