use serde::{Deserialize, Serialize};

use super::boosted::BoostedTreesModel;
use super::features::RateFeatures;
use super::linear::LinearModel;
use crate::types::ScoreError;

/// Closed set of model families the artifact can carry. Adding a family
/// means adding a variant here, not registering a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictiveModel {
    Linear(LinearModel),
    BoostedTrees(BoostedTreesModel),
}

impl PredictiveModel {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictiveModel::Linear(_) => "linear",
            PredictiveModel::BoostedTrees(_) => "boosted_trees",
        }
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, ScoreError> {
        match self {
            PredictiveModel::Linear(model) => model.predict(features),
            PredictiveModel::BoostedTrees(model) => model.predict(features),
        }
    }
}

/// Equal-weight average over the member probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsemblePredictor {
    pub members: Vec<PredictiveModel>,
}

impl EnsemblePredictor {
    pub fn new(members: Vec<PredictiveModel>) -> Self {
        Self { members }
    }

    pub fn predict_probability(&self, features: &RateFeatures) -> Result<f64, ScoreError> {
        if self.members.is_empty() {
            return Err(ScoreError::model_unavailable("ensemble has no members"));
        }
        let array = features.to_array();
        let mut total = 0.0;
        for member in &self.members {
            total += member.predict(&array)?;
        }
        Ok(total / self.members.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_probability_member(probability: f64) -> PredictiveModel {
        // Zero stds collapse every input, leaving only the intercept.
        let logit = (probability / (1.0 - probability)).ln();
        PredictiveModel::Linear(LinearModel {
            coefficients: vec![0.0; RateFeatures::NUM_FEATURES],
            intercept: logit,
            feature_means: vec![0.0; RateFeatures::NUM_FEATURES],
            feature_stds: vec![0.0; RateFeatures::NUM_FEATURES],
        })
    }

    fn any_features() -> RateFeatures {
        RateFeatures {
            momentum_7d: 0.01,
            ma_ratio_7d: 1.0,
            ma_ratio_30d: 1.0,
            range_position_60d: 0.5,
            volatility_60d: 0.003,
            day_of_week: 2.0,
            day_of_month: 15.0,
        }
    }

    #[test]
    fn test_averages_member_probabilities() {
        let ensemble = EnsemblePredictor::new(vec![
            fixed_probability_member(0.2),
            fixed_probability_member(0.8),
        ]);
        let prob = ensemble.predict_probability(&any_features()).unwrap();
        assert!((prob - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_member_passes_through() {
        let ensemble = EnsemblePredictor::new(vec![fixed_probability_member(0.7)]);
        let prob = ensemble.predict_probability(&any_features()).unwrap();
        assert!((prob - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_empty_ensemble_is_unavailable() {
        let ensemble = EnsemblePredictor::new(vec![]);
        let err = ensemble.predict_probability(&any_features()).unwrap_err();
        assert!(matches!(err, ScoreError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_member_shape_error_propagates() {
        let ensemble = EnsemblePredictor::new(vec![PredictiveModel::Linear(LinearModel {
            coefficients: vec![0.0; 3],
            intercept: 0.0,
            feature_means: vec![0.0; 3],
            feature_stds: vec![0.0; 3],
        })]);
        let err = ensemble.predict_probability(&any_features()).unwrap_err();
        assert!(matches!(err, ScoreError::FeatureShape { .. }));
    }

    #[test]
    fn test_serialized_members_carry_kind_tag() {
        let ensemble = EnsemblePredictor::new(vec![
            fixed_probability_member(0.5),
            PredictiveModel::BoostedTrees(BoostedTreesModel {
                num_features: RateFeatures::NUM_FEATURES,
                base_score: 0.0,
                shrinkage: 0.05,
                trees: vec![],
            }),
        ]);
        let json = serde_json::to_value(&ensemble).unwrap();
        assert_eq!(json["members"][0]["kind"], "linear");
        assert_eq!(json["members"][1]["kind"], "boosted_trees");
    }
}
