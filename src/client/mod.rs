use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::analytics::MarketInsights;
use crate::config::{InferenceSettings, ScoringSettings};
use crate::scoring::fallback_result;
use crate::types::{
    CurrencyPair, RateSeries, Recommendation, ScoreError, ScorePath, TimingOutcome, TimingResult,
    UnavailableReason,
};

/// Caller-side view of the scoring service: one bounded attempt over HTTP,
/// then the local percentile fallback, then explicit unavailability. Retry
/// policy deliberately does not exist here.
pub struct TimingClient {
    client: Client,
    base_url: String,
}

impl TimingClient {
    pub fn new(settings: &InferenceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The full fallback ladder. `series` is whatever trailing history the
    /// caller already holds for the pair; it is never re-fetched here.
    pub async fn score_with_fallback(
        &self,
        pair: &CurrencyPair,
        series: Option<&RateSeries>,
        settings: &ScoringSettings,
    ) -> TimingOutcome {
        match self.fetch_score(pair).await {
            Ok(result) => return TimingOutcome::scored(ScorePath::Model, result),
            Err(err) => {
                warn!(pair = %pair, error = %err, "scoring service unusable, trying local fallback");
            }
        }

        match series {
            Some(series) if series.len() >= settings.fallback_min_days => {
                TimingOutcome::scored(ScorePath::Fallback, fallback_result(series, settings))
            }
            Some(series) => TimingOutcome::unavailable(UnavailableReason::HistoryTooShort {
                days: series.len(),
                required: settings.fallback_min_days,
            }),
            None => TimingOutcome::unavailable(UnavailableReason::NoHistory {
                pair: pair.to_string(),
            }),
        }
    }

    /// Single attempt, no retry. Transport errors, non-success statuses and
    /// schema violations all collapse into the same failure class.
    async fn fetch_score(&self, pair: &CurrencyPair) -> Result<TimingResult, ScoreError> {
        let url = format!("{}/score", self.base_url);
        let body = serde_json::json!({
            "from_currency": pair.from_code(),
            "to_currency": pair.to_code(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoreError::malformed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoreError::malformed(format!("service returned {status}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ScoreError::malformed(format!("body is not JSON: {e}")))?;
        parse_score_response(&value)
    }
}

/// Validate the response against the required shape before trusting it:
/// numeric score in [0,1], a known recommendation, non-empty reasoning and
/// complete market insights.
fn parse_score_response(value: &Value) -> Result<TimingResult, ScoreError> {
    let score = value
        .get("timing_score")
        .and_then(Value::as_f64)
        .ok_or_else(|| ScoreError::malformed("timing_score missing or not numeric"))?;
    if !(0.0..=1.0).contains(&score) {
        return Err(ScoreError::malformed(format!(
            "timing_score {score} outside [0,1]"
        )));
    }

    let recommendation = value
        .get("recommendation")
        .and_then(Value::as_str)
        .and_then(Recommendation::from_str)
        .ok_or_else(|| ScoreError::malformed("recommendation missing or unknown"))?;

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if reasoning.is_empty() {
        return Err(ScoreError::malformed("reasoning missing or empty"));
    }

    let insights = value
        .get("market_insights")
        .ok_or_else(|| ScoreError::malformed("market_insights missing"))?;
    for field in ["two_month_high", "two_month_low", "two_month_avg"] {
        if insights.get(field).and_then(Value::as_f64).is_none() {
            return Err(ScoreError::malformed(format!(
                "market_insights.{field} missing or not numeric"
            )));
        }
    }
    let market_insights: MarketInsights = serde_json::from_value(insights.clone())
        .map_err(|e| ScoreError::malformed(format!("market_insights invalid: {e}")))?;

    let historical_rates = match value.get("historical_rates") {
        Some(rates) => serde_json::from_value(rates.clone())
            .map_err(|e| ScoreError::malformed(format!("historical_rates invalid: {e}")))?,
        None => Vec::new(),
    };

    Ok(TimingResult {
        score,
        recommendation,
        reasoning: reasoning.to_string(),
        market_insights,
        historical_rates,
    })
}
