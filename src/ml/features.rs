use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::analytics::MarketAnalytics;
use crate::types::{RatePoint, RateSeries, ScoreError};

/// Fixed-size feature vector for one observation day. All features are
/// ratios or calendar fields, so a single model serves every corridor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateFeatures {
    pub momentum_7d: f64,
    pub ma_ratio_7d: f64,
    pub ma_ratio_30d: f64,
    pub range_position_60d: f64,
    pub volatility_60d: f64,
    pub day_of_week: f64,
    pub day_of_month: f64,
}

impl RateFeatures {
    pub const NUM_FEATURES: usize = 7;

    /// Schema stored in the model artifact; order must match `to_array`.
    pub const FEATURE_NAMES: [&'static str; Self::NUM_FEATURES] = [
        "momentum_7d",
        "ma_ratio_7d",
        "ma_ratio_30d",
        "range_position_60d",
        "volatility_60d",
        "day_of_week",
        "day_of_month",
    ];

    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.momentum_7d,
            self.ma_ratio_7d,
            self.ma_ratio_30d,
            self.range_position_60d,
            self.volatility_60d,
            self.day_of_week,
            self.day_of_month,
        ]
    }
}

/// Today plus the seven prior observations behind `momentum_7d`.
pub const MIN_OBSERVATIONS: usize = 8;

/// Compute the feature vector for the observation at `idx`. The longer
/// windows clip to whatever history exists before `idx`; only the 7-day
/// momentum lag is a hard requirement.
pub fn extract_features(series: &RateSeries, idx: usize) -> Result<RateFeatures, ScoreError> {
    if idx >= series.len() {
        return Err(ScoreError::FeatureShape {
            detail: format!(
                "feature index {} out of range for {} observations",
                idx,
                series.len()
            ),
        });
    }
    if idx + 1 < MIN_OBSERVATIONS {
        return Err(ScoreError::InsufficientHistory {
            required: MIN_OBSERVATIONS,
            available: idx + 1,
        });
    }

    let today = &series.points()[idx];
    let rate = today.rate;

    let week_ago = series.points()[idx - 7].rate;
    let momentum_7d = if week_ago == 0.0 {
        0.0
    } else {
        (rate - week_ago) / week_ago
    };

    let ma_ratio_7d = ratio_to_mean(rate, series.window_ending(idx, 7));
    let ma_ratio_30d = ratio_to_mean(rate, series.window_ending(idx, 30));

    let window_60 = series.window_ending(idx, 60);
    let range_position_60d = range_position(rate, window_60);
    let volatility_60d = MarketAnalytics::volatility_ratio(window_60);

    Ok(RateFeatures {
        momentum_7d,
        ma_ratio_7d,
        ma_ratio_30d,
        range_position_60d,
        volatility_60d,
        day_of_week: today.date.weekday().num_days_from_monday() as f64,
        day_of_month: today.date.day() as f64,
    })
}

/// Features for the most recent observation in the series.
pub fn latest_features(series: &RateSeries) -> Result<RateFeatures, ScoreError> {
    if series.is_empty() {
        return Err(ScoreError::InsufficientHistory {
            required: MIN_OBSERVATIONS,
            available: 0,
        });
    }
    extract_features(series, series.len() - 1)
}

fn ratio_to_mean(rate: f64, window: &[RatePoint]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let mean = window.iter().map(|p| p.rate).sum::<f64>() / window.len() as f64;
    if mean == 0.0 {
        0.0
    } else {
        rate / mean
    }
}

fn range_position(rate: f64, window: &[RatePoint]) -> f64 {
    let mut high = f64::MIN;
    let mut low = f64::MAX;
    for point in window {
        high = high.max(point.rate);
        low = low.min(point.rate);
    }
    let span = high - low;
    if span == 0.0 {
        return 0.5;
    }
    ((rate - low) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(rates: &[f64]) -> RateSeries {
        // 2024-01-01 is a Monday.
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RatePoint::new(start + chrono::Days::new(i as u64), r))
            .collect();
        RateSeries::new(points).unwrap()
    }

    #[test]
    fn test_names_match_array_order() {
        assert_eq!(RateFeatures::FEATURE_NAMES.len(), RateFeatures::NUM_FEATURES);
        let features = RateFeatures {
            momentum_7d: 1.0,
            ma_ratio_7d: 2.0,
            ma_ratio_30d: 3.0,
            range_position_60d: 4.0,
            volatility_60d: 5.0,
            day_of_week: 6.0,
            day_of_month: 7.0,
        };
        assert_eq!(features.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_requires_seven_prior_observations() {
        let s = series(&[1.0; 7]);
        let err = extract_features(&s, 6).unwrap_err();
        assert_eq!(
            err,
            ScoreError::InsufficientHistory {
                required: 8,
                available: 7
            }
        );
    }

    #[test]
    fn test_out_of_range_index_is_shape_error() {
        let s = series(&[1.0; 10]);
        let err = extract_features(&s, 10).unwrap_err();
        assert!(matches!(err, ScoreError::FeatureShape { .. }));
    }

    #[test]
    fn test_constant_series_features() {
        let s = series(&[2.0; 60]);
        let f = latest_features(&s).unwrap();
        assert_eq!(f.momentum_7d, 0.0);
        assert_eq!(f.ma_ratio_7d, 1.0);
        assert_eq!(f.ma_ratio_30d, 1.0);
        assert_eq!(f.range_position_60d, 0.5);
        assert_eq!(f.volatility_60d, 0.0);
    }

    #[test]
    fn test_momentum_against_week_old_rate() {
        let mut rates = vec![1.0; 8];
        rates[7] = 1.1;
        let s = series(&rates);
        let f = extract_features(&s, 7).unwrap();
        assert!((f.momentum_7d - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_range_position_at_extremes() {
        let mut rates = vec![1.5; 59];
        rates.push(2.0);
        let s = series(&rates);
        let f = latest_features(&s).unwrap();
        assert_eq!(f.range_position_60d, 1.0);

        let mut rates = vec![1.5; 59];
        rates.push(1.0);
        let s = series(&rates);
        let f = latest_features(&s).unwrap();
        assert_eq!(f.range_position_60d, 0.0);
    }

    #[test]
    fn test_windows_clip_to_available_history() {
        // 10 observations: the 30- and 60-day windows cover all of them.
        let rates: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let s = series(&rates);
        let f = latest_features(&s).unwrap();
        let mean_all = 5.5;
        assert!((f.ma_ratio_30d - 10.0 / mean_all).abs() < 1e-12);
        assert_eq!(f.range_position_60d, 1.0);
    }

    #[test]
    fn test_calendar_features() {
        let s = series(&[1.0; 8]);
        let f = extract_features(&s, 7).unwrap();
        // 2024-01-08 is a Monday.
        assert_eq!(f.day_of_week, 0.0);
        assert_eq!(f.day_of_month, 8.0);
    }

    #[test]
    fn test_latest_matches_explicit_index() {
        let rates: Vec<f64> = (0..70).map(|i| 1.0 + (i as f64 * 0.2).sin() * 0.05).collect();
        let s = series(&rates);
        assert_eq!(
            latest_features(&s).unwrap(),
            extract_features(&s, 69).unwrap()
        );
    }
}
