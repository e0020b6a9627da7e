//! Repository for timestamped device readings.

use anyhow::Result;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use sqlx::{FromRow, SqlitePool};

use crate::domain::{ConsumptionRecord, ConsumptionTotal};

/// Raw reading columns used to build training matrices.
#[derive(Debug, Clone, FromRow)]
pub struct TrainingRow {
    pub device_id: i64,
    pub voltage: f64,
    pub current: f64,
    pub time_on: f64,
    pub active_energy: f64,
    pub reading_timestamp: DateTime<Utc>,
}

pub struct ConsumptionRepository {
    pool: SqlitePool,
}

impl ConsumptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Readings for one device, oldest first, with optional time bounds.
    pub async fn find_for_device(
        &self,
        device_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<ConsumptionRecord>> {
        let records = sqlx::query_as::<_, ConsumptionRecord>(
            "SELECT id, device_id, voltage, current, time_on, active_energy, reading_timestamp
             FROM consumption_records
             WHERE device_id = ?
               AND (? IS NULL OR reading_timestamp >= ?)
               AND (? IS NULL OR reading_timestamp <= ?)
             ORDER BY reading_timestamp",
        )
        .bind(device_id)
        .bind(start)
        .bind(start)
        .bind(end)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// SUM(active_energy) per device, optionally limited to a device set and
    /// a time range. Devices without readings in range are absent.
    pub async fn totals_by_device(
        &self,
        device_ids: Option<&[i64]>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<ConsumptionTotal>> {
        // Ids are i64s parsed upstream, safe to inline for the IN clause.
        let id_filter = match device_ids {
            Some(ids) if !ids.is_empty() => {
                format!("AND device_id IN ({})", ids.iter().join(","))
            }
            _ => String::new(),
        };
        let sql = format!(
            "SELECT device_id, SUM(active_energy) AS total_energy
             FROM consumption_records
             WHERE 1 = 1 {id_filter}
               AND (? IS NULL OR reading_timestamp >= ?)
               AND (? IS NULL OR reading_timestamp <= ?)
             GROUP BY device_id
             ORDER BY device_id"
        );

        let totals = sqlx::query_as::<_, ConsumptionTotal>(&sql)
            .bind(start)
            .bind(start)
            .bind(end)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(totals)
    }

    /// Insert a locally reported reading.
    pub async fn insert(
        &self,
        device_id: i64,
        voltage: f64,
        current: f64,
        time_on: f64,
        active_energy: f64,
        reading_timestamp: DateTime<Utc>,
    ) -> Result<ConsumptionRecord> {
        let result = sqlx::query(
            "INSERT INTO consumption_records
                 (device_id, voltage, current, time_on, active_energy, reading_timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(voltage)
        .bind(current)
        .bind(time_on)
        .bind(active_energy)
        .bind(reading_timestamp)
        .execute(&self.pool)
        .await?;

        Ok(ConsumptionRecord {
            id: result.last_insert_rowid(),
            device_id,
            voltage,
            current,
            time_on,
            active_energy,
            reading_timestamp,
        })
    }

    /// Insert a vendor reading under its vendor-assigned id. Rows already
    /// present are left untouched; returns true when a row was added.
    pub async fn insert_synced(
        &self,
        id: i64,
        device_id: i64,
        voltage: f64,
        current: f64,
        time_on: f64,
        active_energy: f64,
        reading_timestamp: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO consumption_records
                 (id, device_id, voltage, current, time_on, active_energy, reading_timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(device_id)
        .bind(voltage)
        .bind(current)
        .bind(time_on)
        .bind(active_energy)
        .bind(reading_timestamp)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All readings for one device, for model training.
    pub async fn training_rows_for_device(&self, device_id: i64) -> Result<Vec<TrainingRow>> {
        let rows = sqlx::query_as::<_, TrainingRow>(
            "SELECT device_id, voltage, current, time_on, active_energy, reading_timestamp
             FROM consumption_records
             WHERE device_id = ?
             ORDER BY reading_timestamp",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All readings network-wide, for the peak demand model.
    pub async fn training_rows_all(&self) -> Result<Vec<TrainingRow>> {
        let rows = sqlx::query_as::<_, TrainingRow>(
            "SELECT device_id, voltage, current, time_on, active_energy, reading_timestamp
             FROM consumption_records
             ORDER BY reading_timestamp",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
