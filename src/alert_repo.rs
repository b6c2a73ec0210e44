// Trigger rules and alert rows. Alerts are a historical record: they are
// created, resolved and acknowledged, never deleted.

use crate::db::{from_ms, to_ms};
use crate::models::{
    ActiveAlert, Alert, AlertCounts, DeviceType, Severity, Trigger, TriggerOp,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::instrument;

/// Trigger fields as configured by an administrator.
#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub name: String,
    pub description: Option<String>,
    pub metric_type: String,
    pub operator: TriggerOp,
    pub threshold: f64,
    pub duration_seconds: i64,
    pub severity: Severity,
    pub device_type_filter: Option<DeviceType>,
    pub enabled: bool,
}

pub struct AlertRepo {
    pool: SqlitePool,
}

impl AlertRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_trigger(&self, t: &NewTrigger, now: DateTime<Utc>) -> anyhow::Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO triggers
                (name, description, metric_type, operator, threshold,
                 duration_seconds, severity, device_type_filter, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&t.name)
        .bind(&t.description)
        .bind(&t.metric_type)
        .bind(t.operator.as_str())
        .bind(t.threshold)
        .bind(t.duration_seconds)
        .bind(t.severity.as_str())
        .bind(t.device_type_filter.map(|d| d.as_str()))
        .bind(t.enabled)
        .bind(to_ms(now))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn list_enabled_triggers(&self) -> anyhow::Result<Vec<Trigger>> {
        let rows = sqlx::query("SELECT * FROM triggers WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(parse_trigger_row).collect()
    }

    /// Creates an alert unless an unresolved one with the same (device, title)
    /// already exists. Check-then-create runs inside one transaction, so a
    /// losing concurrent evaluator is a no-op.
    #[instrument(skip(self, trigger), fields(repo = "alert", operation = "create_if_absent", title = %trigger.name))]
    pub async fn create_alert_if_absent(
        &self,
        device_id: i64,
        trigger: &Trigger,
        current_value: f64,
        hostname: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM alerts
             WHERE device_id = $1 AND title = $2 AND resolved_at IS NULL",
        )
        .bind(device_id)
        .bind(&trigger.name)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            tx.commit().await?;
            return Ok(None);
        }

        let message = format_alert_message(trigger, current_value, hostname);
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO alerts (device_id, severity, title, message, triggered_at)
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(device_id)
        .bind(trigger.severity.as_str())
        .bind(&trigger.name)
        .bind(&message)
        .bind(to_ms(now))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(alert_id = id, device_id, title = %trigger.name, value = current_value, "alert created");
        Ok(Some(id))
    }

    /// Auto-resolution: closes the open alert matching (device, title), if any.
    #[instrument(skip(self), fields(repo = "alert", operation = "resolve_open"))]
    pub async fn resolve_open(
        &self,
        device_id: i64,
        title: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let r = sqlx::query(
            "UPDATE alerts SET resolved_at = $1
             WHERE device_id = $2 AND title = $3 AND resolved_at IS NULL",
        )
        .bind(to_ms(now))
        .bind(device_id)
        .bind(title)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() > 0 {
            tracing::info!(device_id, title, "alert auto-resolved");
        }
        Ok(r.rows_affected())
    }

    /// Acknowledgement is orthogonal to resolution and allowed on any alert.
    pub async fn acknowledge(
        &self,
        alert_id: i64,
        username: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let r = sqlx::query(
            "UPDATE alerts SET acknowledged = 1, acknowledged_by = $1, acknowledged_at = $2
             WHERE id = $3",
        )
        .bind(username)
        .bind(to_ms(now))
        .bind(alert_id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    pub async fn get(&self, alert_id: i64) -> anyhow::Result<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = $1")
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| parse_alert_row(&r)).transpose()
    }

    /// Unresolved alerts joined with device hostname, newest first.
    pub async fn active_alerts(&self) -> anyhow::Result<Vec<ActiveAlert>> {
        let rows = sqlx::query(
            "SELECT a.*, COALESCE(d.hostname, d.ip) AS device_name
             FROM alerts a JOIN devices d ON d.id = a.device_id
             WHERE a.resolved_at IS NULL
             ORDER BY a.triggered_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(ActiveAlert {
                    alert: parse_alert_row(r)?,
                    hostname: r.try_get("device_name")?,
                })
            })
            .collect()
    }

    /// Device ids with at least one unresolved alert.
    pub async fn devices_with_open_alerts(&self) -> anyhow::Result<u64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT device_id) FROM alerts WHERE resolved_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(n as u64)
    }

    pub async fn active_counts(&self) -> anyhow::Result<AlertCounts> {
        let rows = sqlx::query(
            "SELECT severity, COUNT(*) AS n FROM alerts
             WHERE resolved_at IS NULL GROUP BY severity",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut counts = AlertCounts::default();
        for row in rows {
            let severity: String = row.try_get("severity")?;
            let n: i64 = row.try_get("n")?;
            let n = n as u64;
            match Severity::parse(&severity) {
                Severity::Info => counts.info += n,
                Severity::Warning => counts.warning += n,
                Severity::Average => counts.average += n,
                Severity::High => counts.high += n,
                Severity::Disaster => counts.disaster += n,
            }
            counts.total += n;
        }
        Ok(counts)
    }
}

fn format_alert_message(trigger: &Trigger, current_value: f64, hostname: &str) -> String {
    let what = trigger.description.as_deref().unwrap_or(&trigger.name);
    format!(
        "[{}] {}: current value {} ({}), threshold {} {}",
        hostname,
        what,
        current_value,
        trigger.metric_type,
        trigger.operator.as_str(),
        trigger.threshold
    )
}

fn parse_trigger_row(row: &SqliteRow) -> anyhow::Result<Trigger> {
    let operator: String = row.try_get("operator")?;
    let operator = TriggerOp::parse(&operator)
        .ok_or_else(|| anyhow::anyhow!("unknown trigger operator: {}", operator))?;
    let severity: String = row.try_get("severity")?;
    let device_type_filter: Option<String> = row.try_get("device_type_filter")?;
    Ok(Trigger {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        metric_type: row.try_get("metric_type")?,
        operator,
        threshold: row.try_get("threshold")?,
        duration_seconds: row.try_get("duration_seconds")?,
        severity: Severity::parse(&severity),
        device_type_filter: device_type_filter.as_deref().map(DeviceType::parse),
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        created_at: from_ms(row.try_get("created_at")?),
    })
}

fn parse_alert_row(row: &SqliteRow) -> anyhow::Result<Alert> {
    let severity: String = row.try_get("severity")?;
    let resolved_at: Option<i64> = row.try_get("resolved_at")?;
    let acknowledged_at: Option<i64> = row.try_get("acknowledged_at")?;
    Ok(Alert {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        severity: Severity::parse(&severity),
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        triggered_at: from_ms(row.try_get("triggered_at")?),
        resolved_at: resolved_at.map(from_ms),
        acknowledged: row.try_get::<i64, _>("acknowledged")? != 0,
        acknowledged_by: row.try_get("acknowledged_by")?,
        acknowledged_at: acknowledged_at.map(from_ms),
    })
}
