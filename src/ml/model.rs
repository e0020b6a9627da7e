//! Random forest wrapper with disk persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::path::Path;

use super::{ModelMetadata, TrainingMetrics};

/// A trained random forest plus its training metadata, serialized as one
/// bincode blob.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegressionModel {
    pub metadata: ModelMetadata,
    forest: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

fn forest_parameters() -> RandomForestRegressorParameters {
    RandomForestRegressorParameters {
        max_depth: None,
        min_samples_leaf: 1,
        min_samples_split: 2,
        n_trees: 100,
        m: None,
        keep_samples: false,
        seed: 42,
    }
}

impl RegressionModel {
    /// Fit a forest on row-major feature vectors. Fails on an empty or
    /// ragged dataset.
    pub fn train(x: &[Vec<f64>], y: &[f64], feature_names: &[&str]) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            anyhow::bail!("cannot train on an empty dataset");
        }
        if x.len() != y.len() {
            anyhow::bail!(
                "feature and target count mismatch: {} rows, {} targets",
                x.len(),
                y.len()
            );
        }

        let n_samples = x.len();
        let n_features = x[0].len();
        let mut flat = Vec::with_capacity(n_samples * n_features);
        for row in x {
            if row.len() != n_features {
                anyhow::bail!("all feature vectors must have length {n_features}");
            }
            flat.extend_from_slice(row);
        }

        let x_matrix = DenseMatrix::new(n_samples, n_features, flat, false);
        let y_vec = y.to_vec();

        let forest = RandomForestRegressor::fit(&x_matrix, &y_vec, forest_parameters())
            .map_err(|e| anyhow::anyhow!("random forest training failed: {e:?}"))?;

        let fitted = forest
            .predict(&x_matrix)
            .map_err(|e| anyhow::anyhow!("training-set prediction failed: {e:?}"))?;
        let metrics = TrainingMetrics::compute(&fitted, y)?;

        Ok(Self {
            metadata: ModelMetadata {
                trained_at: chrono::Utc::now(),
                training_samples: n_samples,
                feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
                metrics,
            },
            forest,
        })
    }

    /// Predict a single target value from one feature vector.
    pub fn predict_one(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.metadata.feature_names.len() {
            anyhow::bail!(
                "expected {} features, got {}",
                self.metadata.feature_names.len(),
                features.len()
            );
        }
        let x = DenseMatrix::new(1, features.len(), features.to_vec(), false);
        let predictions = self
            .forest
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("prediction failed: {e:?}"))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("model returned no prediction"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating model directory {parent:?}"))?;
        }
        let bytes = bincode::serialize(self).context("serializing model")?;
        std::fs::write(path, bytes).with_context(|| format!("writing model to {path:?}"))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading model from {path:?}"))?;
        bincode::deserialize(&bytes).context("deserializing model")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2*a + 3*b over a small grid.
        let mut x = Vec::new();
        let mut y = Vec::new();
        for a in 0..6 {
            for b in 0..6 {
                x.push(vec![a as f64, b as f64]);
                y.push(2.0 * a as f64 + 3.0 * b as f64);
            }
        }
        (x, y)
    }

    #[test]
    fn trains_and_predicts_in_target_range() {
        let (x, y) = linear_dataset();
        let model = RegressionModel::train(&x, &y, &["a", "b"]).unwrap();
        assert_eq!(model.metadata.training_samples, 36);

        let p = model.predict_one(&[3.0, 3.0]).unwrap();
        assert!(p >= 0.0 && p <= 25.0, "prediction {p} outside target range");
        assert!(model.metadata.metrics.rmse < 5.0);
    }

    #[test]
    fn rejects_empty_and_ragged_input() {
        assert!(RegressionModel::train(&[], &[], &["a"]).is_err());
        assert!(RegressionModel::train(
            &[vec![1.0, 2.0], vec![1.0]],
            &[1.0, 2.0],
            &["a", "b"]
        )
        .is_err());
        assert!(RegressionModel::train(&[vec![1.0]], &[1.0, 2.0], &["a"]).is_err());
    }

    #[test]
    fn rejects_wrong_feature_count_at_prediction() {
        let (x, y) = linear_dataset();
        let model = RegressionModel::train(&x, &y, &["a", "b"]).unwrap();
        assert!(model.predict_one(&[1.0]).is_err());
    }

    #[test]
    fn survives_save_load_roundtrip() {
        let (x, y) = linear_dataset();
        let model = RegressionModel::train(&x, &y, &["a", "b"]).unwrap();
        let before = model.predict_one(&[2.0, 4.0]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        model.save(&path).unwrap();

        let restored = RegressionModel::load(&path).unwrap();
        let after = restored.predict_one(&[2.0, 4.0]).unwrap();
        assert_eq!(before, after);
        assert_eq!(restored.metadata.training_samples, 36);
    }
}
