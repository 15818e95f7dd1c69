use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::types::{CurrencyPair, RatePoint, RateSeries};

/// Where daily observations come from. The server reads a local snapshot;
/// tests substitute a mock.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Full history for one corridor, oldest first, or `None` when the
    /// source has never seen the pair.
    async fn series_for(&self, pair: &CurrencyPair) -> Result<Option<RateSeries>>;
}

/// One snapshot row: `date,from_currency,to_currency,rate`.
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    date: NaiveDate,
    from_currency: String,
    to_currency: String,
    rate: f64,
}

/// In-memory corridor map loaded once from the daily-rates CSV snapshot.
pub struct CsvRateStore {
    corridors: HashMap<CurrencyPair, RateSeries>,
}

impl CsvRateStore {
    /// Rows may arrive unordered and with duplicate dates; the later row
    /// wins a duplicate. Rows that fail to parse, carry bad codes, or
    /// carry a non-positive rate are counted and dropped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening rates snapshot {}", path.display()))?;
        let mut reader = csv::Reader::from_reader(std::io::BufReader::new(file));

        let mut raw: HashMap<CurrencyPair, HashMap<NaiveDate, f64>> = HashMap::new();
        let mut skipped = 0usize;
        for result in reader.deserialize() {
            let row: SnapshotRow = match result {
                Ok(row) => row,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let Some(pair) = CurrencyPair::new(&row.from_currency, &row.to_currency) else {
                skipped += 1;
                continue;
            };
            if !row.rate.is_finite() || row.rate <= 0.0 {
                skipped += 1;
                continue;
            }
            raw.entry(pair).or_default().insert(row.date, row.rate);
        }

        let mut corridors = HashMap::new();
        for (pair, by_date) in raw {
            let mut points: Vec<RatePoint> = by_date
                .into_iter()
                .map(|(date, rate)| RatePoint::new(date, rate))
                .collect();
            points.sort_by_key(|p| p.date);
            corridors.insert(pair, RateSeries::new(points)?);
        }

        if skipped > 0 {
            warn!(rows = skipped, "dropped unusable rows from rates snapshot");
        }
        let store = Self { corridors };
        info!(
            corridors = store.corridor_count(),
            path = %path.display(),
            "loaded rates snapshot"
        );
        Ok(store)
    }

    pub fn corridor_count(&self) -> usize {
        self.corridors.len()
    }

    /// Every corridor in a stable order, so training runs see the same
    /// row order every time.
    pub fn corridors(&self) -> Vec<(CurrencyPair, RateSeries)> {
        let mut all: Vec<(CurrencyPair, RateSeries)> = self
            .corridors
            .iter()
            .map(|(pair, series)| (pair.clone(), series.clone()))
            .collect();
        all.sort_by(|a, b| {
            (a.0.from_code(), a.0.to_code()).cmp(&(b.0.from_code(), b.0.to_code()))
        });
        all
    }
}

#[async_trait]
impl RateSource for CsvRateStore {
    async fn series_for(&self, pair: &CurrencyPair) -> Result<Option<RateSeries>> {
        Ok(self.corridors.get(pair).cloned())
    }
}
