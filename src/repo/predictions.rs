//! Repository for stored forecast rows (per-device energy and network peak).

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use itertools::Itertools;
use sqlx::SqlitePool;

use crate::domain::{EnergyPrediction, PeakDemandPrediction};

pub struct PredictionRepository {
    pool: SqlitePool,
}

impl PredictionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn energy_predictions(
        &self,
        device_id: Option<i64>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<EnergyPrediction>> {
        let rows = sqlx::query_as::<_, EnergyPrediction>(
            "SELECT p.id, p.device_id, d.name AS device_name, p.predicted_energy,
                    p.prediction_date, p.prediction_hour, p.created_at
             FROM energy_predictions p
             LEFT JOIN devices d ON d.id = p.device_id
             WHERE (? IS NULL OR p.device_id = ?)
               AND (? IS NULL OR p.prediction_date = ?)
             ORDER BY p.prediction_date, p.prediction_hour",
        )
        .bind(device_id)
        .bind(device_id)
        .bind(date)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn peak_predictions(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<Vec<PeakDemandPrediction>> {
        let rows = sqlx::query_as::<_, PeakDemandPrediction>(
            "SELECT id, predicted_peak_demand, prediction_date, prediction_hour, created_at
             FROM peak_demand_predictions
             WHERE (? IS NULL OR prediction_date = ?)
             ORDER BY prediction_date, prediction_hour",
        )
        .bind(date)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Energy predictions inside a date range (inclusive), optionally limited
    /// to a device set, ordered for summary aggregation.
    pub async fn energy_predictions_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        device_ids: Option<&[i64]>,
    ) -> Result<Vec<EnergyPrediction>> {
        let id_filter = match device_ids {
            Some(ids) if !ids.is_empty() => {
                format!("AND p.device_id IN ({})", ids.iter().join(","))
            }
            _ => String::new(),
        };
        let sql = format!(
            "SELECT p.id, p.device_id, d.name AS device_name, p.predicted_energy,
                    p.prediction_date, p.prediction_hour, p.created_at
             FROM energy_predictions p
             LEFT JOIN devices d ON d.id = p.device_id
             WHERE p.prediction_date >= ? AND p.prediction_date <= ? {id_filter}
             ORDER BY p.prediction_date, p.prediction_hour, p.device_id"
        );
        let rows = sqlx::query_as::<_, EnergyPrediction>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn peak_predictions_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PeakDemandPrediction>> {
        let rows = sqlx::query_as::<_, PeakDemandPrediction>(
            "SELECT id, predicted_peak_demand, prediction_date, prediction_hour, created_at
             FROM peak_demand_predictions
             WHERE prediction_date >= ? AND prediction_date <= ?
             ORDER BY prediction_date, prediction_hour",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Replace one device's stored forecast for a date with fresh hourly
    /// values. Delete and insert run in a single transaction so a failed
    /// regeneration never leaves a half-written day.
    pub async fn replace_energy_for_date(
        &self,
        device_id: i64,
        date: NaiveDate,
        hourly: &[(u32, f64)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM energy_predictions WHERE device_id = ? AND prediction_date = ?")
            .bind(device_id)
            .bind(date)
            .execute(&mut *tx)
            .await?;

        let created_at = Utc::now();
        for (hour, energy) in hourly {
            sqlx::query(
                "INSERT INTO energy_predictions
                     (device_id, predicted_energy, prediction_date, prediction_hour, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(device_id)
            .bind(energy)
            .bind(date)
            .bind(*hour as i64)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replace the stored peak demand forecast for a date.
    pub async fn replace_peak_for_date(
        &self,
        date: NaiveDate,
        hourly: &[(u32, f64)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM peak_demand_predictions WHERE prediction_date = ?")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        let created_at = Utc::now();
        for (hour, demand) in hourly {
            sqlx::query(
                "INSERT INTO peak_demand_predictions
                     (predicted_peak_demand, prediction_date, prediction_hour, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(demand)
            .bind(date)
            .bind(*hour as i64)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
