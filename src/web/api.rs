use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::ml::ModelArtifact;
use crate::scoring::score_series;
use crate::types::{CurrencyPair, TimingResult};

// === Scoring ===

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub from_currency: String,
    pub to_currency: String,
}

/// The wire response: normalized codes echoed back, result fields flattened
/// alongside them.
#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub from_currency: String,
    pub to_currency: String,
    #[serde(flatten)]
    pub result: TimingResult,
}

pub async fn post_score(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();

    let Some(pair) = CurrencyPair::new(&req.from_currency, &req.to_currency) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": format!(
                    "invalid currency pair {:?}/{:?}",
                    req.from_currency, req.to_currency
                )
            })),
        )
            .into_response();
    };

    let series = match state.rates.series_for(&pair).await {
        Ok(Some(series)) => series,
        Ok(None) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": format!("no rate history tracked for {pair}")
                })),
            )
                .into_response();
        }
        Err(e) => {
            error!(%request_id, pair = %pair, error = %e, "rate history lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "rate history unavailable"})),
            )
                .into_response();
        }
    };

    let artifact = state.model.current().await;
    match score_series(&series, artifact.as_deref(), &state.config.scoring) {
        Ok((path, result)) => {
            info!(
                %request_id,
                pair = %pair,
                path = %path,
                score = result.score,
                "scored timing request"
            );
            (
                StatusCode::OK,
                Json(ScoreResponse {
                    from_currency: pair.from_code().to_string(),
                    to_currency: pair.to_code().to_string(),
                    result,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!(%request_id, pair = %pair, error = %e, "scoring request rejected");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

// === Model management ===

pub async fn get_model(State(state): State<AppState>) -> impl IntoResponse {
    match state.model.current().await {
        Some(artifact) => model_metadata(&artifact).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "no model artifact loaded, serving percentile fallback"
            })),
        )
            .into_response(),
    }
}

pub async fn post_model_reload(State(state): State<AppState>) -> impl IntoResponse {
    match state.model.reload().await {
        Ok(Some(artifact)) => model_metadata(&artifact).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no model artifact found"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "model reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

fn model_metadata(artifact: &ModelArtifact) -> Json<serde_json::Value> {
    let members: Vec<&str> = artifact.ensemble.members.iter().map(|m| m.kind()).collect();
    Json(json!({
        "trained_on": artifact.trained_on,
        "feature_count": artifact.feature_names.len(),
        "members": members,
        "summary": artifact.summary,
    }))
}

// === Health Check ===

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
