use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{RatePoint, RateSeries};

/// Trailing window for percentile rank and the two-month aggregates.
pub const TWO_MONTH_WINDOW: usize = 60;
/// Trailing window for the one-year trend direction.
pub const ONE_YEAR_WINDOW: usize = 365;

/// Volatility bucket boundaries on stddev / mean over the two-month window.
const HIGH_VOLATILITY_RATIO: f64 = 0.015;
const MEDIUM_VOLATILITY_RATIO: f64 = 0.008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "UP",
            TrendDirection::Down => "DOWN",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolatilityBucket {
    High,
    Medium,
    Low,
}

impl VolatilityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityBucket::High => "HIGH",
            VolatilityBucket::Medium => "MEDIUM",
            VolatilityBucket::Low => "LOW",
        }
    }

    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > HIGH_VOLATILITY_RATIO {
            VolatilityBucket::High
        } else if ratio > MEDIUM_VOLATILITY_RATIO {
            VolatilityBucket::Medium
        } else {
            VolatilityBucket::Low
        }
    }
}

impl fmt::Display for VolatilityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregates over the trailing windows, recomputed per request.
/// Numeric fields are rounded to 4 decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInsights {
    pub two_month_high: f64,
    pub two_month_low: f64,
    pub two_month_avg: f64,
    pub one_year_trend: TrendDirection,
    pub volatility: VolatilityBucket,
}

/// Deterministic window statistics: the entire fallback scoring logic plus
/// the reported market insights. No learned parameters, no randomness.
pub struct MarketAnalytics;

impl MarketAnalytics {
    /// Fraction of days in the window whose rate is at or below the last
    /// (today's) rate. Inclusive comparison, so today always counts for
    /// itself and a constant window ranks 1.0.
    pub fn percentile_rank(window: &[RatePoint]) -> f64 {
        let Some(today) = window.last() else {
            return 0.0;
        };
        let at_or_below = window.iter().filter(|p| p.rate <= today.rate).count();
        at_or_below as f64 / window.len() as f64
    }

    /// Percentile of the latest observation within its trailing two-month
    /// window (shorter histories use what is available).
    pub fn latest_percentile(series: &RateSeries) -> f64 {
        Self::percentile_rank(series.trailing(TWO_MONTH_WINDOW))
    }

    /// stddev (population) divided by mean over the window; 0.0 for a
    /// degenerate window rather than NaN.
    pub fn volatility_ratio(window: &[RatePoint]) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        let rates: Vec<f64> = window.iter().map(|p| p.rate).collect();
        let mean = rates.iter().sum::<f64>() / rates.len() as f64;
        if mean == 0.0 {
            return 0.0;
        }
        let variance = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rates.len() as f64;
        variance.sqrt() / mean
    }

    pub fn insights(series: &RateSeries) -> MarketInsights {
        let window = series.trailing(TWO_MONTH_WINDOW);
        let Some(today) = window.last() else {
            return MarketInsights {
                two_month_high: 0.0,
                two_month_low: 0.0,
                two_month_avg: 0.0,
                one_year_trend: TrendDirection::Down,
                volatility: VolatilityBucket::Low,
            };
        };

        let mut high = f64::MIN;
        let mut low = f64::MAX;
        let mut sum = 0.0;
        for point in window {
            high = high.max(point.rate);
            low = low.min(point.rate);
            sum += point.rate;
        }
        let avg = sum / window.len() as f64;

        let year = series.trailing(ONE_YEAR_WINDOW);
        let year_avg = year.iter().map(|p| p.rate).sum::<f64>() / year.len() as f64;
        let one_year_trend = if today.rate > year_avg {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };

        MarketInsights {
            two_month_high: round4(high),
            two_month_low: round4(low),
            two_month_avg: round4(avg),
            one_year_trend,
            volatility: VolatilityBucket::from_ratio(Self::volatility_ratio(window)),
        }
    }
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
