use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::Device;

pub struct DeviceRepository {
    pool: SqlitePool,
}

/// Partial update applied by `PUT /api/devices/:id`; `None` leaves the column.
#[derive(Debug, Default, Clone)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub meter_number: Option<String>,
    pub rated_power: Option<String>,
    pub relay_status: Option<String>,
}

impl DeviceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Device>> {
        let devices = sqlx::query_as::<_, Device>(
            "SELECT id, name, meter_number, rated_power, relay_status, date_added
             FROM devices ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(devices)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            "SELECT id, name, meter_number, rated_power, relay_status, date_added
             FROM devices WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device)
    }

    pub async fn insert(
        &self,
        name: &str,
        meter_number: Option<&str>,
        rated_power: &str,
        relay_status: Option<&str>,
    ) -> Result<Device> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO devices (name, meter_number, rated_power, relay_status, date_added)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(meter_number)
        .bind(rated_power)
        .bind(relay_status)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Device {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            meter_number: meter_number.map(str::to_string),
            rated_power: rated_power.to_string(),
            relay_status: relay_status.map(str::to_string),
            date_added: now,
        })
    }

    /// Apply a partial update; returns the updated device, or `None` when the
    /// id is unknown.
    pub async fn update(&self, id: i64, update: DeviceUpdate) -> Result<Option<Device>> {
        let result = sqlx::query(
            "UPDATE devices SET
                 name = COALESCE(?, name),
                 meter_number = COALESCE(?, meter_number),
                 rated_power = COALESCE(?, rated_power),
                 relay_status = COALESCE(?, relay_status)
             WHERE id = ?",
        )
        .bind(update.name)
        .bind(update.meter_number)
        .bind(update.rated_power)
        .bind(update.relay_status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    /// Returns false when the device did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or update a device under its vendor-assigned id. A missing
    /// `date_added` keeps the stored value (or stamps now on first insert).
    pub async fn upsert_from_vendor(
        &self,
        id: i64,
        name: &str,
        meter_number: Option<&str>,
        rated_power: &str,
        relay_status: Option<&str>,
        date_added: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let inserted_at = date_added.unwrap_or_else(Utc::now);
        sqlx::query(
            "INSERT INTO devices (id, name, meter_number, rated_power, relay_status, date_added)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 meter_number = excluded.meter_number,
                 rated_power = excluded.rated_power,
                 relay_status = excluded.relay_status,
                 date_added = COALESCE(?, devices.date_added)",
        )
        .bind(id)
        .bind(name)
        .bind(meter_number)
        .bind(rated_power)
        .bind(relay_status)
        .bind(inserted_at)
        .bind(date_added)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
