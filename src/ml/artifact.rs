use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::ensemble::{EnsemblePredictor, PredictiveModel};
use super::features::RateFeatures;
use crate::types::ScoreError;

const ARTIFACT_PREFIX: &str = "timing_model_";
const ARTIFACT_SUFFIX: &str = ".json";

/// Counts and holdout accuracies captured when the model was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub examples: usize,
    pub positives: usize,
    pub corridors: usize,
    pub holdout_examples: usize,
    pub linear_accuracy: f64,
    pub boosted_accuracy: f64,
    pub ensemble_accuracy: f64,
    pub seed: u64,
}

/// A trained model as written to disk. Immutable once saved; the scoring
/// path only ever sees it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub trained_on: NaiveDate,
    pub feature_names: Vec<String>,
    pub ensemble: EnsemblePredictor,
    pub summary: TrainingSummary,
}

impl ModelArtifact {
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}",
            ARTIFACT_PREFIX,
            self.trained_on.format("%Y-%m-%d"),
            ARTIFACT_SUFFIX
        )
    }

    /// Schema check applied on every load. An artifact trained against a
    /// different feature set must never reach the scoring path.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.feature_names != RateFeatures::FEATURE_NAMES {
            return Err(ScoreError::FeatureShape {
                detail: format!(
                    "artifact feature schema {:?} does not match {:?}",
                    self.feature_names,
                    RateFeatures::FEATURE_NAMES
                ),
            });
        }
        if self.ensemble.members.is_empty() {
            return Err(ScoreError::model_unavailable("artifact carries no models"));
        }
        for member in &self.ensemble.members {
            match member {
                PredictiveModel::Linear(model) => {
                    let widths = [
                        model.coefficients.len(),
                        model.feature_means.len(),
                        model.feature_stds.len(),
                    ];
                    if widths != [RateFeatures::NUM_FEATURES; 3] {
                        return Err(ScoreError::FeatureShape {
                            detail: format!("linear member has widths {:?}", widths),
                        });
                    }
                }
                PredictiveModel::BoostedTrees(model) => {
                    if model.num_features != RateFeatures::NUM_FEATURES {
                        return Err(ScoreError::FeatureShape {
                            detail: format!(
                                "boosted member trained on {} features",
                                model.num_features
                            ),
                        });
                    }
                    for tree in &model.trees {
                        tree.validate(model.num_features)
                            .map_err(|detail| ScoreError::FeatureShape { detail })?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        info!("saved model artifact to {}", path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading model artifact {}", path.display()))?;
        let artifact: ModelArtifact = serde_json::from_str(&data)
            .with_context(|| format!("parsing model artifact {}", path.display()))?;
        artifact
            .validate()
            .map_err(|e| anyhow!("invalid model artifact {}: {}", path.display(), e))?;
        Ok(artifact)
    }

    /// Newest artifact in `dir` by the date embedded in the filename.
    /// Files that do not match the naming scheme are ignored.
    pub fn newest_path(dir: &Path) -> Result<Option<PathBuf>> {
        if !dir.exists() {
            return Ok(None);
        }
        let mut newest: Option<(NaiveDate, PathBuf)> = None;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(date) = parse_artifact_date(name) else { continue };
            let newer = match &newest {
                Some((best, _)) => date > *best,
                None => true,
            };
            if newer {
                newest = Some((date, entry.path()));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

fn parse_artifact_date(file_name: &str) -> Option<NaiveDate> {
    let rest = file_name.strip_prefix(ARTIFACT_PREFIX)?;
    let date = rest.strip_suffix(ARTIFACT_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Process-wide slot for the active model. Filled by scanning the artifact
/// directory at startup; swapped only by an explicit reload.
#[derive(Clone)]
pub struct ModelHandle {
    dir: PathBuf,
    current: Arc<RwLock<Option<Arc<ModelArtifact>>>>,
}

impl ModelHandle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Snapshot for one request. A reload landing mid-request does not
    /// change what that request scores against.
    pub async fn current(&self) -> Option<Arc<ModelArtifact>> {
        self.current.read().await.clone()
    }

    /// Re-scan the directory and swap in the newest artifact. The slot
    /// always ends up reflecting what is on disk, so an emptied directory
    /// clears a previously loaded model.
    pub async fn reload(&self) -> Result<Option<Arc<ModelArtifact>>> {
        let loaded = match ModelArtifact::newest_path(&self.dir)? {
            Some(path) => Some(Arc::new(ModelArtifact::load(&path)?)),
            None => None,
        };

        let mut slot = self.current.write().await;
        match (&loaded, slot.as_ref()) {
            (Some(artifact), _) => {
                info!(trained_on = %artifact.trained_on, "model artifact active");
            }
            (None, Some(_)) => {
                warn!(
                    "no model artifact left in {}; dropping loaded model",
                    self.dir.display()
                );
            }
            (None, None) => {
                info!(
                    "no model artifact in {}; scoring will use the fallback path",
                    self.dir.display()
                );
            }
        }
        *slot = loaded.clone();
        Ok(loaded)
    }
}
