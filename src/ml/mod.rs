//! Regression models for energy forecasting.
//!
//! Two model families, both random forests over calendar/electrical
//! features: a per-device energy model (kWh per hour) and a single
//! network-wide peak demand model (kW per hour). Trained models are
//! persisted to disk and reloaded at prediction time.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod features;
pub mod forecaster;
pub mod model;

pub use forecaster::{Forecaster, GenerationReport, TrainingReport};
pub use model::RegressionModel;

/// Metadata stored alongside a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub feature_names: Vec<String>,
    pub metrics: TrainingMetrics,
}

/// Fit metrics computed on the training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub mae: f64,
    pub rmse: f64,
}

impl TrainingMetrics {
    pub fn compute(predictions: &[f64], targets: &[f64]) -> Result<Self> {
        if predictions.len() != targets.len() {
            anyhow::bail!(
                "prediction and target count mismatch: {} vs {}",
                predictions.len(),
                targets.len()
            );
        }
        if predictions.is_empty() {
            anyhow::bail!("no predictions to evaluate");
        }

        let n = predictions.len() as f64;
        let mae = predictions
            .iter()
            .zip(targets)
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;
        let mse = predictions
            .iter()
            .zip(targets)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;

        Ok(Self {
            mae,
            rmse: mse.sqrt(),
        })
    }
}
