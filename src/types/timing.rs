#![allow(dead_code)]
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analytics::MarketInsights;
use super::rates::RatePoint;

/// The published timing opinion for a scoring request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    SendNow,
    Wait,
    Neutral,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::SendNow => "SEND_NOW",
            Recommendation::Wait => "WAIT",
            Recommendation::Neutral => "NEUTRAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SEND_NOW" => Some(Recommendation::SendNow),
            "WAIT" => Some(Recommendation::Wait),
            "NEUTRAL" => Some(Recommendation::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which tier produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePath {
    /// Ensemble probability blended with the historical percentile.
    Model,
    /// Percentile-only scoring, used when the model tier is unusable.
    Fallback,
}

impl ScorePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScorePath::Model => "model",
            ScorePath::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ScorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A complete scoring answer, produced fresh per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingResult {
    #[serde(rename = "timing_score")]
    pub score: f64,
    pub recommendation: Recommendation,
    pub reasoning: String,
    pub market_insights: MarketInsights,
    /// The trailing window the score was computed from, echoed for charting.
    pub historical_rates: Vec<RatePoint>,
}

/// Why neither scoring tier could produce an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The pair has no tracked history at all.
    NoHistory { pair: String },
    /// There is some history, but not enough for even the fallback tier.
    HistoryTooShort { days: usize, required: usize },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NoHistory { pair } => {
                write!(f, "no historical rates tracked for {}", pair)
            }
            UnavailableReason::HistoryTooShort { days, required } => {
                write!(
                    f,
                    "only {} days of history, fallback scoring needs {}",
                    days, required
                )
            }
        }
    }
}

/// The caller-visible contract: a scored answer tagged with the tier that
/// produced it, or an explicit unavailability that can never be mistaken for
/// a low score.
#[derive(Debug, Clone)]
pub enum TimingOutcome {
    Scored {
        path: ScorePath,
        result: TimingResult,
    },
    Unavailable {
        reason: UnavailableReason,
    },
}

impl TimingOutcome {
    pub fn scored(path: ScorePath, result: TimingResult) -> Self {
        Self::Scored { path, result }
    }

    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self::Unavailable { reason }
    }

    pub fn path(&self) -> Option<ScorePath> {
        match self {
            TimingOutcome::Scored { path, .. } => Some(*path),
            TimingOutcome::Unavailable { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&TimingResult> {
        match self {
            TimingOutcome::Scored { result, .. } => Some(result),
            TimingOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, TimingOutcome::Unavailable { .. })
    }
}
