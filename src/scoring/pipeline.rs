use tracing::warn;

use crate::analytics::{MarketAnalytics, TWO_MONTH_WINDOW};
use crate::config::ScoringSettings;
use crate::ml::{latest_features, ModelArtifact};
use crate::types::{RateSeries, ScoreError, ScorePath, TimingResult};

use super::blend::{blend_scores, build_reasoning, fallback_score, recommendation_for};

/// Score a corridor with whichever tier is available. The only error that
/// escapes is insufficient history; any model-path failure degrades to the
/// percentile tier instead of surfacing.
pub fn score_series(
    series: &RateSeries,
    artifact: Option<&ModelArtifact>,
    settings: &ScoringSettings,
) -> Result<(ScorePath, TimingResult), ScoreError> {
    if series.len() < settings.min_history_days {
        return Err(ScoreError::InsufficientHistory {
            required: settings.min_history_days,
            available: series.len(),
        });
    }

    let percentile = MarketAnalytics::latest_percentile(series);

    if let Some(artifact) = artifact {
        match model_probability(series, artifact) {
            Ok(probability) => {
                let score = blend_scores(probability, percentile, settings);
                return Ok((
                    ScorePath::Model,
                    assemble(series, score, percentile, settings),
                ));
            }
            Err(err) if err.is_model_path_failure() => {
                warn!(error = %err, "model path failed, degrading to percentile tier");
            }
            Err(err) => return Err(err),
        }
    }

    Ok((ScorePath::Fallback, fallback_result(series, settings)))
}

/// Percentile-only result. Shared by the service when no model is loaded
/// and by callers doing local fallback after a failed service call.
pub fn fallback_result(series: &RateSeries, settings: &ScoringSettings) -> TimingResult {
    let percentile = MarketAnalytics::latest_percentile(series);
    assemble(series, fallback_score(percentile), percentile, settings)
}

fn model_probability(series: &RateSeries, artifact: &ModelArtifact) -> Result<f64, ScoreError> {
    let features = latest_features(series)?;
    artifact.ensemble.predict_probability(&features)
}

fn assemble(
    series: &RateSeries,
    score: f64,
    percentile: f64,
    settings: &ScoringSettings,
) -> TimingResult {
    let recommendation = recommendation_for(score, settings);
    TimingResult {
        score,
        recommendation,
        reasoning: build_reasoning(percentile, recommendation),
        market_insights: MarketAnalytics::insights(series),
        historical_rates: series.trailing(TWO_MONTH_WINDOW).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{EnsemblePredictor, PredictiveModel, RateFeatures, TrainingSummary};
    use crate::types::{RatePoint, Recommendation};
    use chrono::NaiveDate;

    fn series(rates: &[f64]) -> RateSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RatePoint::new(start + chrono::Days::new(i as u64), r))
            .collect();
        RateSeries::new(points).unwrap()
    }

    fn settings() -> ScoringSettings {
        ScoringSettings::default()
    }

    fn artifact_with_probability(probability: f64) -> ModelArtifact {
        let width = RateFeatures::NUM_FEATURES;
        let logit = (probability / (1.0 - probability)).ln();
        ModelArtifact {
            trained_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            feature_names: RateFeatures::FEATURE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ensemble: EnsemblePredictor::new(vec![PredictiveModel::Linear(
                crate::ml::linear::LinearModel {
                    coefficients: vec![0.0; width],
                    intercept: logit,
                    feature_means: vec![0.0; width],
                    feature_stds: vec![0.0; width],
                },
            )]),
            summary: TrainingSummary {
                examples: 100,
                positives: 40,
                corridors: 2,
                holdout_examples: 20,
                linear_accuracy: 0.6,
                boosted_accuracy: 0.6,
                ensemble_accuracy: 0.6,
                seed: 42,
            },
        }
    }

    #[test]
    fn test_constant_window_scores_full_send_now() {
        let s = series(&vec![10.0; 60]);
        let (path, result) = score_series(&s, None, &settings()).unwrap();
        assert_eq!(path, ScorePath::Fallback);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.recommendation, Recommendation::SendNow);
        assert!(result.reasoning.contains("100%"));
    }

    #[test]
    fn test_strict_minimum_scores_wait() {
        let mut rates = vec![10.0; 59];
        rates.push(9.0);
        let s = series(&rates);
        let (path, result) = score_series(&s, None, &settings()).unwrap();
        assert_eq!(path, ScorePath::Fallback);
        assert_eq!(result.score, 0.02);
        assert_eq!(result.recommendation, Recommendation::Wait);
        assert!(result.reasoning.contains("2%"));
    }

    #[test]
    fn test_history_below_floor_is_an_error() {
        let s = series(&vec![1.0; 59]);
        let err = score_series(&s, None, &settings()).unwrap_err();
        assert_eq!(
            err,
            ScoreError::InsufficientHistory {
                required: 60,
                available: 59
            }
        );
    }

    #[test]
    fn test_model_path_blends_probability_with_percentile() {
        // Constant window: percentile 1.0. Model says 0.5.
        // 0.4 * 0.5 + 0.6 * 1.0 = 0.8 -> NEUTRAL at the boundary.
        let s = series(&vec![10.0; 60]);
        let artifact = artifact_with_probability(0.5);
        let (path, result) = score_series(&s, Some(&artifact), &settings()).unwrap();
        assert_eq!(path, ScorePath::Model);
        assert_eq!(result.score, 0.8);
        assert_eq!(result.recommendation, Recommendation::Neutral);
    }

    #[test]
    fn test_broken_artifact_degrades_to_fallback() {
        let s = series(&vec![10.0; 60]);
        let mut artifact = artifact_with_probability(0.5);
        // A member trained against a different feature width.
        artifact.ensemble.members = vec![PredictiveModel::Linear(crate::ml::linear::LinearModel {
            coefficients: vec![0.0; 3],
            intercept: 0.0,
            feature_means: vec![0.0; 3],
            feature_stds: vec![0.0; 3],
        })];
        let (path, result) = score_series(&s, Some(&artifact), &settings()).unwrap();
        assert_eq!(path, ScorePath::Fallback);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_empty_ensemble_degrades_to_fallback() {
        let s = series(&vec![10.0; 60]);
        let mut artifact = artifact_with_probability(0.5);
        artifact.ensemble.members.clear();
        let (path, _) = score_series(&s, Some(&artifact), &settings()).unwrap();
        assert_eq!(path, ScorePath::Fallback);
    }

    #[test]
    fn test_historical_echo_is_the_trailing_window() {
        let rates: Vec<f64> = (0..90).map(|i| 1.0 + i as f64 * 0.001).collect();
        let s = series(&rates);
        let (_, result) = score_series(&s, None, &settings()).unwrap();
        assert_eq!(result.historical_rates.len(), 60);
        assert_eq!(
            result.historical_rates.last().unwrap().rate,
            s.latest().unwrap().rate
        );
    }

    #[test]
    fn test_fallback_result_matches_score_series_fallback() {
        let rates: Vec<f64> = (0..75).map(|i| 1.0 + (i as f64 * 0.3).sin() * 0.01).collect();
        let s = series(&rates);
        let (_, via_service) = score_series(&s, None, &settings()).unwrap();
        let direct = fallback_result(&s, &settings());
        assert_eq!(via_service.score, direct.score);
        assert_eq!(via_service.recommendation, direct.recommendation);
        assert_eq!(via_service.reasoning, direct.reasoning);
    }
}
