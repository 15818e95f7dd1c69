use anyhow::{anyhow, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ScoreError;

/// Logistic regression weights with the z-score parameters captured at
/// training time. Embedded verbatim in the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
}

impl LinearModel {
    /// Probability of a favorable day for one feature row.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ScoreError> {
        if features.len() != self.coefficients.len() {
            return Err(ScoreError::FeatureShape {
                detail: format!(
                    "linear model expects {} features, got {}",
                    self.coefficients.len(),
                    features.len()
                ),
            });
        }

        let mut z = self.intercept;
        for j in 0..features.len() {
            let std = self.feature_stds[j];
            let normalized = if std > 1e-10 {
                (features[j] - self.feature_means[j]) / std
            } else {
                0.0
            };
            z += self.coefficients[j] * normalized;
        }
        Ok(sigmoid(z))
    }
}

/// Gradient-descent trainer for [`LinearModel`]. Fully deterministic, so
/// retraining on the same data reproduces the same weights.
pub struct LinearTrainer {
    pub max_iter: usize,
    pub learning_rate: f64,
    pub l2_lambda: f64,
}

impl Default for LinearTrainer {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.01,
            l2_lambda: 0.01,
        }
    }
}

impl LinearTrainer {
    pub fn fit(&self, features: &Array2<f64>, labels: &[f64]) -> Result<LinearModel> {
        let n = features.nrows();
        let num_features = features.ncols();
        if n != labels.len() {
            return Err(anyhow!(
                "feature rows ({}) and labels ({}) disagree",
                n,
                labels.len()
            ));
        }
        if n < 2 {
            return Err(anyhow!("need at least 2 rows to fit, got {}", n));
        }

        let means = features
            .mean_axis(Axis(0))
            .ok_or_else(|| anyhow!("empty feature matrix"))?;
        let stds = features.std_axis(Axis(0), 1.0);

        // Z-score; constant columns collapse to zero instead of dividing by
        // a vanishing std.
        let mut normalized = Array2::<f64>::zeros((n, num_features));
        for j in 0..num_features {
            let std = stds[j];
            if std > 1e-10 {
                for i in 0..n {
                    normalized[[i, j]] = (features[[i, j]] - means[j]) / std;
                }
            }
        }

        let mut coefficients = vec![0.0; num_features];
        let mut intercept = 0.0;

        for _iter in 0..self.max_iter {
            let mut grad_coef = vec![0.0; num_features];
            let mut grad_intercept = 0.0;

            for i in 0..n {
                let mut z = intercept;
                for j in 0..num_features {
                    z += coefficients[j] * normalized[[i, j]];
                }
                let error = sigmoid(z) - labels[i];

                grad_intercept += error;
                for j in 0..num_features {
                    grad_coef[j] += error * normalized[[i, j]];
                }
            }

            intercept -= self.learning_rate * grad_intercept / n as f64;
            for j in 0..num_features {
                coefficients[j] -= self.learning_rate
                    * (grad_coef[j] / n as f64 + self.l2_lambda * coefficients[j]);
            }
        }

        debug!(rows = n, features = num_features, "fitted linear model");

        Ok(LinearModel {
            coefficients,
            intercept,
            feature_means: means.to_vec(),
            feature_stds: stds.to_vec(),
        })
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
