use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use super::{api, AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(api::health_check))
        .route("/score", post(api::post_score))
        .route("/model", get(api::get_model))
        .route("/model/reload", post(api::post_model_reload))
        .layer(cors)
        .with_state(state)
}

/// Explicit origin allowlist. Credentials are allowed, so wildcards are not
/// an option here.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);

    info!("scoring service listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::data::MockRateSource;
    use crate::ml::ModelHandle;
    use crate::types::{RatePoint, RateSeries};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::Arc;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("fx-timing-web-{}", Uuid::new_v4()))
    }

    fn series(rates: &[f64]) -> RateSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RatePoint::new(start + chrono::Days::new(i as u64), r))
            .collect();
        RateSeries::new(points).unwrap()
    }

    fn state_with(rates: MockRateSource) -> AppState {
        AppState {
            config: Arc::new(AppConfig::default()),
            model: ModelHandle::new(temp_dir()),
            rates: Arc::new(rates),
        }
    }

    async fn spawn_app(state: AppState) -> String {
        let app = build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let base = spawn_app(state_with(MockRateSource::new())).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_score_normalizes_codes_and_falls_back_without_model() {
        let mut rates = MockRateSource::new();
        let s = series(&vec![10.0; 60]);
        rates
            .expect_series_for()
            .returning(move |_| Ok(Some(s.clone())));
        let base = spawn_app(state_with(rates)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/score"))
            .json(&json!({"from_currency": "eur", "to_currency": "usd"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["from_currency"], "EUR");
        assert_eq!(body["to_currency"], "USD");
        // Constant window counts every day as a tie, so the fallback hits 1.0.
        assert_eq!(body["timing_score"], 1.0);
        assert_eq!(body["recommendation"], "SEND_NOW");
        assert_eq!(body["historical_rates"].as_array().unwrap().len(), 60);
    }

    #[tokio::test]
    async fn test_score_rejects_invalid_codes() {
        let base = spawn_app(state_with(MockRateSource::new())).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/score"))
            .json(&json!({"from_currency": "EURO", "to_currency": "USD"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);

        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("EURO"));
    }

    #[tokio::test]
    async fn test_score_rejects_untracked_pair() {
        let mut rates = MockRateSource::new();
        rates.expect_series_for().returning(|_| Ok(None));
        let base = spawn_app(state_with(rates)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/score"))
            .json(&json!({"from_currency": "GBP", "to_currency": "JPY"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);

        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("GBP/JPY"));
    }

    #[tokio::test]
    async fn test_score_rejects_short_history() {
        let mut rates = MockRateSource::new();
        let s = series(&vec![1.0; 59]);
        rates
            .expect_series_for()
            .returning(move |_| Ok(Some(s.clone())));
        let base = spawn_app(state_with(rates)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/score"))
            .json(&json!({"from_currency": "EUR", "to_currency": "USD"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);

        let body: Value = response.json().await.unwrap();
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("insufficient history"));
        assert!(message.contains("60"));
    }

    #[tokio::test]
    async fn test_model_endpoints_report_missing_artifact() {
        let base = spawn_app(state_with(MockRateSource::new())).await;
        let client = reqwest::Client::new();

        let response = client.get(format!("{base}/model")).send().await.unwrap();
        assert_eq!(response.status(), 404);

        let response = client
            .post(format!("{base}/model/reload"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_only() {
        let base = spawn_app(state_with(MockRateSource::new())).await;
        let client = reqwest::Client::new();

        let allowed = client
            .get(format!("{base}/health"))
            .header("Origin", "http://localhost:3000")
            .send()
            .await
            .unwrap();
        assert_eq!(
            allowed
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "http://localhost:3000"
        );

        let denied = client
            .get(format!("{base}/health"))
            .header("Origin", "http://evil.example")
            .send()
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
