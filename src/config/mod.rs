use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment variables override file values, e.g.
/// `FX_TIMING__SERVER__PORT=9000`.
const ENV_PREFIX: &str = "FX_TIMING";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub scoring: ScoringSettings,
    pub data: DataSettings,
    pub inference: InferenceSettings,
    pub training: TrainingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            scoring: ScoringSettings::default(),
            data: DataSettings::default(),
            inference: InferenceSettings::default(),
            training: TrainingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file if present, then environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("building configuration")?;

        let app: AppConfig = settings
            .try_deserialize()
            .context("deserializing configuration")?;
        app.validate()
            .map_err(|errors| anyhow!("invalid configuration: {}", errors.join("; ")))?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.host.is_empty() {
            errors.push("server.host must not be empty".to_string());
        }

        let weights = &self.scoring;
        if !(0.0..=1.0).contains(&weights.model_weight)
            || !(0.0..=1.0).contains(&weights.percentile_weight)
        {
            errors.push("scoring weights must be between 0 and 1".to_string());
        }
        if (weights.model_weight + weights.percentile_weight - 1.0).abs() > 1e-9 {
            errors.push("scoring weights must sum to 1".to_string());
        }
        if !(0.0..=1.0).contains(&weights.send_now_threshold)
            || !(0.0..=1.0).contains(&weights.wait_threshold)
        {
            errors.push("recommendation thresholds must be between 0 and 1".to_string());
        }
        if weights.wait_threshold >= weights.send_now_threshold {
            errors.push("wait_threshold must be below send_now_threshold".to_string());
        }
        if weights.fallback_min_days == 0 {
            errors.push("fallback_min_days must be > 0".to_string());
        }
        if weights.min_history_days < weights.fallback_min_days {
            errors.push("min_history_days must be >= fallback_min_days".to_string());
        }

        if self.inference.timeout_secs == 0 || self.inference.timeout_secs > 5 {
            errors.push("inference.timeout_secs must be between 1 and 5".to_string());
        }
        if self.inference.base_url.is_empty() {
            errors.push("inference.base_url must not be empty".to_string());
        }

        let training = &self.training;
        if training.trees == 0 {
            errors.push("training.trees must be > 0".to_string());
        }
        if training.max_depth == 0 {
            errors.push("training.max_depth must be > 0".to_string());
        }
        if training.learning_rate <= 0.0 || training.learning_rate > 1.0 {
            errors.push("training.learning_rate must be in (0, 1]".to_string());
        }
        if training.subsample <= 0.0 || training.subsample > 1.0 {
            errors.push("training.subsample must be in (0, 1]".to_string());
        }
        if training.holdout_fraction <= 0.0 || training.holdout_fraction >= 1.0 {
            errors.push("training.holdout_fraction must be in (0, 1)".to_string());
        }
        if training.min_corridor_observations == 0 {
            errors.push("training.min_corridor_observations must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    pub model_weight: f64,
    pub percentile_weight: f64,
    pub send_now_threshold: f64,
    pub wait_threshold: f64,
    pub min_history_days: usize,
    pub fallback_min_days: usize,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            model_weight: 0.4,
            percentile_weight: 0.6,
            send_now_threshold: 0.80,
            wait_threshold: 0.50,
            min_history_days: 60,
            fallback_min_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub rates_csv: PathBuf,
    pub model_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            rates_csv: PathBuf::from("data/rates.csv"),
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub seed: u64,
    pub holdout_fraction: f64,
    pub min_corridor_observations: usize,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            trees: 300,
            max_depth: 5,
            learning_rate: 0.05,
            subsample: 0.8,
            seed: 42,
            holdout_fraction: 0.2,
            min_corridor_observations: 100,
        }
    }
}
