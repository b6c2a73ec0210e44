// Metric history. Append-only; rows are never updated, only pruned by retention.

use crate::db::{from_ms, to_ms};
use crate::models::MetricSample;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::instrument;

pub struct MetricRepo {
    pool: SqlitePool,
    retention_ms: i64,
}

impl MetricRepo {
    pub fn new(pool: SqlitePool, retention_days: u32) -> Self {
        let retention_ms = (retention_days as i64) * 24 * 60 * 60 * 1000;
        Self { pool, retention_ms }
    }

    #[instrument(skip(self, sample), fields(repo = "metric", operation = "record", metric_type = %sample.metric_type))]
    pub async fn record(&self, sample: &MetricSample) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO metrics (device_id, metric_type, value, unit, timestamp)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(sample.device_id)
        .bind(&sample.metric_type)
        .bind(sample.value)
        .bind(&sample.unit)
        .bind(to_ms(sample.timestamp))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent value of one metric for one device.
    pub async fn latest(
        &self,
        device_id: i64,
        metric_type: &str,
    ) -> anyhow::Result<Option<MetricSample>> {
        let row = sqlx::query(
            "SELECT device_id, metric_type, value, unit, timestamp FROM metrics
             WHERE device_id = $1 AND metric_type = $2
             ORDER BY id DESC LIMIT 1",
        )
        .bind(device_id)
        .bind(metric_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| parse_sample_row(&r)).transpose()?)
    }

    /// Samples for one device in ascending timestamp order.
    pub async fn recent(&self, device_id: i64, limit: u32) -> anyhow::Result<Vec<MetricSample>> {
        let rows = sqlx::query(
            "SELECT device_id, metric_type, value, unit, timestamp FROM metrics
             WHERE device_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(device_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut out = rows
            .iter()
            .map(parse_sample_row)
            .collect::<Result<Vec<_>, _>>()?;
        out.reverse();
        Ok(out)
    }

    #[instrument(skip(self), fields(repo = "metric", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        let cutoff = crate::db::now_ms() - self.retention_ms;
        let r = sqlx::query("DELETE FROM metrics WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }
}

fn parse_sample_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<MetricSample> {
    Ok(MetricSample {
        device_id: row.try_get("device_id")?,
        metric_type: row.try_get("metric_type")?,
        value: row.try_get("value")?,
        unit: row.try_get("unit")?,
        timestamp: from_ms(row.try_get("timestamp")?),
    })
}
