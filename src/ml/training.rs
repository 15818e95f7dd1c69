use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use super::artifact::{ModelArtifact, TrainingSummary};
use super::boosted::BoostedTrainer;
use super::ensemble::{EnsemblePredictor, PredictiveModel};
use super::features::{extract_features, RateFeatures};
use super::linear::LinearTrainer;
use crate::analytics::TWO_MONTH_WINDOW;
use crate::config::TrainingSettings;
use crate::types::{CurrencyPair, RatePoint, RateSeries};

/// Look-ahead horizon for labels.
pub const LABEL_HORIZON: usize = 10;
/// A day is favorable when it ranks in the top 3 of the next 10.
const LABEL_TOP_K: usize = 3;
/// Pooled-dataset floor below which a model is not worth fitting.
const MIN_POOLED_EXAMPLES: usize = 30;

/// Pooled, labeled examples across every usable corridor.
pub struct TrainingSet {
    pub features: Array2<f64>,
    pub labels: Vec<f64>,
    pub corridors: usize,
}

/// Label for the observation at `idx`, or `None` inside the unlabeled tail.
/// Favorable means today's rate is at or above the 3rd-highest of the next
/// ten observations, so ties count as favorable.
pub fn label_for(points: &[RatePoint], idx: usize) -> Option<f64> {
    if idx + LABEL_HORIZON >= points.len() {
        return None;
    }
    let mut future: Vec<f64> = points[idx + 1..=idx + LABEL_HORIZON]
        .iter()
        .map(|p| p.rate)
        .collect();
    future.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let threshold = future[LABEL_TOP_K - 1];
    Some(if points[idx].rate >= threshold { 1.0 } else { 0.0 })
}

/// Build the pooled dataset. Corridors shorter than `min_observations` are
/// skipped entirely; the remaining ones contribute one example per fully
/// windowed, labelable index.
pub fn build_training_set(
    corridors: &[(CurrencyPair, RateSeries)],
    min_observations: usize,
) -> Result<TrainingSet> {
    let mut rows: Vec<[f64; RateFeatures::NUM_FEATURES]> = Vec::new();
    let mut labels = Vec::new();
    let mut used = 0;

    for (pair, series) in corridors {
        if series.len() < min_observations {
            warn!(
                corridor = %pair,
                observations = series.len(),
                required = min_observations,
                "skipping corridor with insufficient history"
            );
            continue;
        }

        let points = series.points();
        let start = TWO_MONTH_WINDOW - 1;
        let mut contributed = 0;
        for idx in start..points.len() {
            let Some(label) = label_for(points, idx) else {
                break;
            };
            let features = extract_features(series, idx)?;
            rows.push(features.to_array());
            labels.push(label);
            contributed += 1;
        }
        if contributed > 0 {
            used += 1;
        }
        info!(corridor = %pair, examples = contributed, "collected corridor examples");
    }

    let mut features = Array2::<f64>::zeros((rows.len(), RateFeatures::NUM_FEATURES));
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            features[[i, j]] = value;
        }
    }

    Ok(TrainingSet {
        features,
        labels,
        corridors: used,
    })
}

/// Train the full ensemble on every corridor at once and package it as an
/// artifact. The shuffle, the split and both trainers are seeded, so the
/// same inputs always produce the same artifact.
pub fn train_model(
    corridors: &[(CurrencyPair, RateSeries)],
    settings: &TrainingSettings,
    trained_on: NaiveDate,
) -> Result<ModelArtifact> {
    let set = build_training_set(corridors, settings.min_corridor_observations)?;
    let n = set.labels.len();
    if n < MIN_POOLED_EXAMPLES {
        return Err(anyhow!(
            "not enough labeled examples to train: {} < {}",
            n,
            MIN_POOLED_EXAMPLES
        ));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(settings.seed);
    indices.shuffle(&mut rng);

    let holdout_count = ((n as f64 * settings.holdout_fraction).round() as usize).clamp(1, n - 1);
    let (holdout_idx, train_idx) = indices.split_at(holdout_count);

    let train_x = select_rows(&set.features, train_idx);
    let train_y: Vec<f64> = train_idx.iter().map(|&i| set.labels[i]).collect();
    let holdout_x = select_rows(&set.features, holdout_idx);
    let holdout_y: Vec<f64> = holdout_idx.iter().map(|&i| set.labels[i]).collect();

    let linear = LinearTrainer::default().fit(&train_x, &train_y)?;
    let boosted = BoostedTrainer {
        trees: settings.trees,
        max_depth: settings.max_depth,
        learning_rate: settings.learning_rate,
        subsample: settings.subsample,
        min_leaf: 5,
        seed: settings.seed,
    }
    .fit(&train_x, &train_y)?;

    let members = vec![
        PredictiveModel::Linear(linear),
        PredictiveModel::BoostedTrees(boosted),
    ];
    let linear_accuracy = member_accuracy(&members[0], &holdout_x, &holdout_y)?;
    let boosted_accuracy = member_accuracy(&members[1], &holdout_x, &holdout_y)?;

    let ensemble = EnsemblePredictor::new(members);
    let ensemble_accuracy = {
        let mut correct = 0;
        for i in 0..holdout_x.nrows() {
            let row = holdout_x.row(i).to_vec();
            let prob = average_probability(&ensemble, &row)?;
            if (prob >= 0.5) == (holdout_y[i] >= 0.5) {
                correct += 1;
            }
        }
        correct as f64 / holdout_x.nrows() as f64
    };

    let positives = set.labels.iter().filter(|&&l| l >= 0.5).count();
    info!(
        examples = n,
        positives,
        corridors = set.corridors,
        linear_accuracy,
        boosted_accuracy,
        ensemble_accuracy,
        "trained timing model"
    );

    Ok(ModelArtifact {
        trained_on,
        feature_names: RateFeatures::FEATURE_NAMES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ensemble,
        summary: TrainingSummary {
            examples: n,
            positives,
            corridors: set.corridors,
            holdout_examples: holdout_count,
            linear_accuracy,
            boosted_accuracy,
            ensemble_accuracy,
            seed: settings.seed,
        },
    })
}

fn select_rows(features: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((indices.len(), features.ncols()));
    for (out_i, &src_i) in indices.iter().enumerate() {
        for j in 0..features.ncols() {
            out[[out_i, j]] = features[[src_i, j]];
        }
    }
    out
}

fn member_accuracy(
    member: &PredictiveModel,
    features: &Array2<f64>,
    labels: &[f64],
) -> Result<f64> {
    let mut correct = 0;
    for i in 0..features.nrows() {
        let row = features.row(i).to_vec();
        let prob = member.predict(&row)?;
        if (prob >= 0.5) == (labels[i] >= 0.5) {
            correct += 1;
        }
    }
    Ok(correct as f64 / features.nrows() as f64)
}

fn average_probability(ensemble: &EnsemblePredictor, row: &[f64]) -> Result<f64> {
    let mut total = 0.0;
    for member in &ensemble.members {
        total += member.predict(row)?;
    }
    Ok(total / ensemble.members.len() as f64)
}
