// Trigger rules and alert lifecycle models

use crate::models::DeviceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Average,
    High,
    Disaster,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Average => "average",
            Severity::High => "high",
            Severity::Disaster => "disaster",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "warning" => Severity::Warning,
            "average" => Severity::Average,
            "high" => Severity::High,
            "disaster" => Severity::Disaster,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
}

impl TriggerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOp::Gt => ">",
            TriggerOp::Ge => ">=",
            TriggerOp::Lt => "<",
            TriggerOp::Le => "<=",
            TriggerOp::Eq => "==",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(TriggerOp::Gt),
            ">=" => Some(TriggerOp::Ge),
            "<" => Some(TriggerOp::Lt),
            "<=" => Some(TriggerOp::Le),
            "==" => Some(TriggerOp::Eq),
            _ => None,
        }
    }

    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            TriggerOp::Gt => value > threshold,
            TriggerOp::Ge => value >= threshold,
            TriggerOp::Lt => value < threshold,
            TriggerOp::Le => value <= threshold,
            TriggerOp::Eq => value == threshold,
        }
    }
}

/// A configured threshold rule. Read-only to the engine at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub metric_type: String,
    pub operator: TriggerOp,
    pub threshold: f64,
    /// 0 = fire on the first violating sample.
    pub duration_seconds: i64,
    pub severity: Severity,
    pub device_type_filter: Option<DeviceType>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Trigger {
    /// A sample metric type matches the rule when equal or prefixed, so a
    /// "disk_usage" rule covers disk_usage_C:, disk_usage_D:, ...
    pub fn matches_metric(&self, metric_type: &str) -> bool {
        metric_type == self.metric_type
            || metric_type
                .strip_prefix(&self.metric_type)
                .is_some_and(|rest| rest.starts_with('_'))
    }

    pub fn applies_to(&self, device_type: DeviceType) -> bool {
        match self.device_type_filter {
            Some(filter) => filter == device_type,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    pub device_id: i64,
    pub severity: Severity,
    /// Equals the trigger name; (device_id, title) has at most one unresolved row.
    pub title: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Unresolved alert joined with its device hostname for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlert {
    #[serde(flatten)]
    pub alert: Alert,
    pub hostname: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertCounts {
    pub info: u64,
    pub warning: u64,
    pub average: u64,
    pub high: u64,
    pub disaster: u64,
    pub total: u64,
}
