#![allow(dead_code)]
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily observation for a corridor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub rate: f64,
}

impl RatePoint {
    pub fn new(date: NaiveDate, rate: f64) -> Self {
        Self { date, rate }
    }
}

/// Date-ordered daily series for one corridor.
///
/// Invariants, enforced at construction: strictly ascending dates (no
/// duplicates) and every rate positive and finite. Missing days are simply
/// absent entries, never zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSeries {
    points: Vec<RatePoint>,
}

impl RateSeries {
    pub fn new(points: Vec<RatePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(anyhow!("rate series cannot be empty"));
        }
        for (i, point) in points.iter().enumerate() {
            if !point.rate.is_finite() || point.rate <= 0.0 {
                return Err(anyhow!(
                    "rate on {} must be positive and finite, got {}",
                    point.date,
                    point.rate
                ));
            }
            if i > 0 && points[i - 1].date >= point.date {
                return Err(anyhow!(
                    "dates must be strictly ascending: {} then {}",
                    points[i - 1].date,
                    point.date
                ));
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[RatePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&RatePoint> {
        self.points.last()
    }

    pub fn get(&self, idx: usize) -> Option<&RatePoint> {
        self.points.get(idx)
    }

    /// Window of up to `len` points ending at (and including) `idx`.
    /// Shorter histories fall back to whatever is available.
    pub fn window_ending(&self, idx: usize, len: usize) -> &[RatePoint] {
        let end = (idx + 1).min(self.points.len());
        let start = end.saturating_sub(len);
        &self.points[start..end]
    }

    /// Trailing window of up to `len` points ending at the latest observation.
    pub fn trailing(&self, len: usize) -> &[RatePoint] {
        self.window_ending(self.points.len().saturating_sub(1), len)
    }
}
