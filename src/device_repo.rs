// Device inventory. Upserts keyed by ip; discovery never deletes a row,
// a device that stops responding just keeps its last known state.

use crate::db::{from_ms, to_ms};
use crate::models::{Device, DeviceRecord, DeviceType, PrinterDetail, WindowsDetail};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::instrument;

#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub id: i64,
    /// True when this ip was not in the inventory before.
    pub created: bool,
}

pub struct DeviceRepo {
    pool: SqlitePool,
}

impl DeviceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-update keyed by ip. The most recent audit wins; last_seen is
    /// refreshed on every successful audit.
    #[instrument(skip(self, record), fields(repo = "device", operation = "upsert", ip = %record.ip))]
    pub async fn upsert(
        &self,
        record: &DeviceRecord,
        now: DateTime<Utc>,
    ) -> anyhow::Result<UpsertOutcome> {
        let errors = serde_json::to_string(&record.errors)?;
        let windows_detail = record
            .windows_detail
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let printer_detail = record
            .printer_detail
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now_ms = to_ms(now);

        let mut tx = self.pool.begin().await?;
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM devices WHERE ip = $1")
            .bind(&record.ip)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE devices SET
                        hostname = $1, mac = $2, device_type = $3, icon = $4,
                        vendor = $5, confidence = $6, os_detail = $7, serial = $8,
                        location = $9, errors = $10, windows_detail = $11,
                        printer_detail = $12, last_seen = $13
                    WHERE id = $14
                    "#,
                )
                .bind(&record.hostname)
                .bind(&record.mac)
                .bind(record.device_type.as_str())
                .bind(&record.icon)
                .bind(&record.vendor)
                .bind(&record.confidence)
                .bind(&record.os_detail)
                .bind(&record.serial)
                .bind(&record.location)
                .bind(&errors)
                .bind(&windows_detail)
                .bind(&printer_detail)
                .bind(now_ms)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome { id, created: false }
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO devices
                        (ip, hostname, mac, device_type, icon, vendor, confidence,
                         os_detail, serial, location, errors, windows_detail,
                         printer_detail, last_seen, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                    RETURNING id
                    "#,
                )
                .bind(&record.ip)
                .bind(&record.hostname)
                .bind(&record.mac)
                .bind(record.device_type.as_str())
                .bind(&record.icon)
                .bind(&record.vendor)
                .bind(&record.confidence)
                .bind(&record.os_detail)
                .bind(&record.serial)
                .bind(&record.location)
                .bind(&errors)
                .bind(&windows_detail)
                .bind(&printer_detail)
                .bind(now_ms)
                .bind(now_ms)
                .fetch_one(&mut *tx)
                .await?;
                UpsertOutcome { id, created: true }
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn get_by_ip(&self, ip: &str) -> anyhow::Result<Option<Device>> {
        let row = sqlx::query("SELECT * FROM devices WHERE ip = $1")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| parse_device_row(&r)).transpose()
    }

    pub async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Device>> {
        let row = sqlx::query("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| parse_device_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(repo = "device", operation = "list"))]
    pub async fn list(&self) -> anyhow::Result<Vec<Device>> {
        let rows = sqlx::query("SELECT * FROM devices ORDER BY ip")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(parse_device_row).collect()
    }

    /// Known ips, for cheap NEW/UPDATED bookkeeping before an audit pass.
    pub async fn known_ips(&self) -> anyhow::Result<std::collections::HashSet<String>> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT ip FROM devices")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn count(&self) -> anyhow::Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }
}

fn parse_device_row(row: &SqliteRow) -> anyhow::Result<Device> {
    let errors: String = row.try_get("errors")?;
    let errors: Vec<String> = serde_json::from_str(&errors).unwrap_or_default();
    let windows_detail: Option<String> = row.try_get("windows_detail")?;
    let windows_detail: Option<WindowsDetail> = windows_detail
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());
    let printer_detail: Option<String> = row.try_get("printer_detail")?;
    let printer_detail: Option<PrinterDetail> = printer_detail
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());
    let device_type: String = row.try_get("device_type")?;

    Ok(Device {
        id: row.try_get("id")?,
        ip: row.try_get("ip")?,
        hostname: row.try_get("hostname")?,
        mac: row.try_get("mac")?,
        device_type: DeviceType::parse(&device_type),
        icon: row.try_get("icon")?,
        vendor: row.try_get("vendor")?,
        confidence: row.try_get("confidence")?,
        os_detail: row.try_get("os_detail")?,
        serial: row.try_get("serial")?,
        location: row.try_get("location")?,
        errors,
        windows_detail,
        printer_detail,
        last_seen: from_ms(row.try_get("last_seen")?),
        created_at: from_ms(row.try_get("created_at")?),
    })
}
