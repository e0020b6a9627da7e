//! Model training and forecast generation over the local store.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PredictorConfig;
use crate::ml::features;
use crate::ml::{ModelMetadata, RegressionModel};
use crate::repo::consumption::TrainingRow;
use crate::repo::Repositories;

/// Outcome of one prediction generation pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GenerationReport {
    pub days_ahead: u32,
    pub devices_predicted: usize,
    pub devices_skipped: usize,
    pub peak_predicted: bool,
}

/// Outcome of a full training pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TrainingReport {
    pub devices_trained: usize,
    pub devices_failed: usize,
    pub peak_trained: bool,
}

pub struct Forecaster {
    repos: Arc<Repositories>,
    models_dir: PathBuf,
    min_device_samples: usize,
    min_peak_samples: usize,
}

impl Forecaster {
    pub fn new(repos: Arc<Repositories>, cfg: &PredictorConfig) -> Self {
        Self {
            repos,
            models_dir: PathBuf::from(&cfg.models_dir),
            min_device_samples: cfg.min_device_samples,
            min_peak_samples: cfg.min_peak_samples,
        }
    }

    pub fn device_model_path(&self, device_id: i64) -> PathBuf {
        self.models_dir
            .join(format!("energy_model_device_{device_id}.bin"))
    }

    pub fn peak_model_path(&self) -> PathBuf {
        self.models_dir.join("peak_demand_model.bin")
    }

    /// Train and persist the energy model for one device from its stored
    /// readings. Fails when fewer than `min_device_samples` readings exist.
    pub async fn train_device_model(&self, device_id: i64) -> Result<ModelMetadata> {
        let rows = self
            .repos
            .consumption
            .training_rows_for_device(device_id)
            .await?;
        if rows.len() < self.min_device_samples {
            anyhow::bail!(
                "not enough readings to train device {device_id}: {} of {} required",
                rows.len(),
                self.min_device_samples
            );
        }

        let mut x = Vec::with_capacity(rows.len());
        let mut y = Vec::with_capacity(rows.len());
        for row in &rows {
            x.push(features::energy_features_from_reading(
                row.reading_timestamp,
                row.time_on,
                row.current,
                row.voltage,
            ));
            y.push(row.active_energy);
        }

        let model = RegressionModel::train(&x, &y, &features::ENERGY_FEATURES)
            .with_context(|| format!("training energy model for device {device_id}"))?;
        model.save(&self.device_model_path(device_id))?;
        info!(
            device_id,
            samples = model.metadata.training_samples,
            mae = model.metadata.metrics.mae,
            "energy model trained"
        );
        Ok(model.metadata)
    }

    /// Train and persist the network peak demand model. Readings from every
    /// device are reduced to summed power per calendar bucket.
    pub async fn train_peak_model(&self) -> Result<ModelMetadata> {
        let rows = self.repos.consumption.training_rows_all().await?;
        if rows.len() < self.min_peak_samples {
            anyhow::bail!(
                "not enough readings to train the peak demand model: {} of {} required",
                rows.len(),
                self.min_peak_samples
            );
        }

        let (x, y) = aggregate_peak_targets(&rows);
        let model = RegressionModel::train(&x, &y, &features::PEAK_FEATURES)
            .context("training peak demand model")?;
        model.save(&self.peak_model_path())?;
        info!(
            buckets = model.metadata.training_samples,
            mae = model.metadata.metrics.mae,
            "peak demand model trained"
        );
        Ok(model.metadata)
    }

    /// Nightly job entry point: peak model plus one model per device.
    /// Per-device failures (usually thin history) are logged, not fatal.
    pub async fn train_all(&self) -> Result<TrainingReport> {
        let mut report = TrainingReport::default();

        match self.train_peak_model().await {
            Ok(_) => report.peak_trained = true,
            Err(e) => warn!(error = %e, "peak demand model training failed"),
        }

        for device in self.repos.devices.list_all().await? {
            match self.train_device_model(device.id).await {
                Ok(_) => report.devices_trained += 1,
                Err(e) => {
                    report.devices_failed += 1;
                    warn!(device_id = device.id, error = %e, "device model training failed");
                }
            }
        }
        Ok(report)
    }

    /// Generate hourly forecasts for today plus `days_ahead - 1` further
    /// days. Regeneration replaces previously stored rows for each date.
    pub async fn generate_predictions(&self, days_ahead: u32) -> Result<GenerationReport> {
        let days_ahead = days_ahead.max(1);
        let today = Local::now().date_naive();
        let mut report = GenerationReport {
            days_ahead,
            ..Default::default()
        };

        for device in self.repos.devices.list_all().await? {
            let model = match self.load_or_train_device_model(device.id).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(device_id = device.id, error = %e, "skipping device without model");
                    report.devices_skipped += 1;
                    continue;
                }
            };

            for day in 0..days_ahead {
                let date = today + Duration::days(day as i64);
                let mut hourly = Vec::with_capacity(24);
                for hour in 0..24 {
                    let value =
                        model.predict_one(&features::energy_features_for_forecast(date, hour))?;
                    hourly.push((hour, value));
                }
                self.repos
                    .predictions
                    .replace_energy_for_date(device.id, date, &hourly)
                    .await?;
            }
            report.devices_predicted += 1;
        }

        // Peak forecasts only when a trained model exists; the nightly
        // training job is responsible for producing one.
        let peak_path = self.peak_model_path();
        if peak_path.exists() {
            let model = RegressionModel::load(&peak_path)?;
            for day in 0..days_ahead {
                let date = today + Duration::days(day as i64);
                let mut hourly = Vec::with_capacity(24);
                for hour in 0..24 {
                    let value = model.predict_one(&features::peak_features(date, hour))?;
                    hourly.push((hour, value));
                }
                self.repos
                    .predictions
                    .replace_peak_for_date(date, &hourly)
                    .await?;
            }
            report.peak_predicted = true;
        }

        info!(
            days_ahead,
            devices = report.devices_predicted,
            skipped = report.devices_skipped,
            peak = report.peak_predicted,
            "prediction generation complete"
        );
        Ok(report)
    }

    async fn load_or_train_device_model(&self, device_id: i64) -> Result<RegressionModel> {
        let path = self.device_model_path(device_id);
        if path.exists() {
            return RegressionModel::load(&path);
        }
        self.train_device_model(device_id).await?;
        RegressionModel::load(&path)
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }
}

/// Reduce raw readings to the peak model's training set: total power (kW)
/// per (hour, day-of-week, month) bucket, summed across devices and weeks.
pub fn aggregate_peak_targets(rows: &[TrainingRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut buckets: BTreeMap<(u32, u32, u32), f64> = BTreeMap::new();
    for row in rows {
        let ts = row.reading_timestamp;
        let key = (
            ts.hour(),
            ts.weekday().num_days_from_monday(),
            ts.month(),
        );
        *buckets.entry(key).or_insert(0.0) += features::power_kw(row.voltage, row.current);
    }

    let mut x = Vec::with_capacity(buckets.len());
    let mut y = Vec::with_capacity(buckets.len());
    for ((hour, dow, month), power) in buckets {
        x.push(vec![hour as f64, dow as f64, month as f64]);
        y.push(power);
    }
    (x, y)
}
