use analysis_core::{AnalysisError, DividendEvent, MarketDataProvider, PriceBar};
use analysis_orchestrator::{AnalysisConfig, AnalysisOrchestrator};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use crate::{build_router, AppState};

/// In-memory market with a handful of `.BK` tickers.
pub struct StaticMarket {
    prices: HashMap<String, Vec<PriceBar>>,
    dividends: HashMap<String, Vec<DividendEvent>>,
}

impl StaticMarket {
    pub fn new() -> Self {
        let mut market = Self {
            prices: HashMap::new(),
            dividends: HashMap::new(),
        };
        for (ticker, base, amplitude, dividend) in [
            ("AAA.BK", 50.0, 1.0, 2.0),
            ("BBB.BK", 80.0, 3.0, 1.5),
            ("CCC.BK", 20.0, 0.5, 1.2),
            ("DDD.BK", 120.0, 4.0, 3.0),
        ] {
            market.add(ticker, base, amplitude, dividend);
        }
        market
    }

    fn add(&mut self, ticker: &str, base: f64, amplitude: f64, dividend: f64) {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = Utc::now().date_naive();
        let days = (end - start).num_days();
        let bars = (0..=days)
            .map(|i| {
                let phase = i as f64 * (0.05 + base / 1000.0);
                PriceBar::new(start + Duration::days(i), base + amplitude * phase.sin())
            })
            .collect();
        let dividends = (2019..=2024)
            .map(|y| DividendEvent::new(NaiveDate::from_ymd_opt(y, 5, 10).unwrap(), dividend))
            .collect();
        self.prices.insert(ticker.to_string(), bars);
        self.dividends.insert(ticker.to_string(), dividends);
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarket {
    async fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        Ok(self
            .prices
            .get(symbol)
            .map(|bars| bars.iter().filter(|b| b.date >= start && b.date <= end).copied().collect())
            .unwrap_or_default())
    }

    async fn get_dividend_history(&self, symbol: &str) -> Result<Vec<DividendEvent>, AnalysisError> {
        if symbol == "DOWN.BK" {
            return Err(AnalysisError::Fetch {
                symbol: symbol.to_string(),
                reason: "HTTP 503".to_string(),
            });
        }
        Ok(self.dividends.get(symbol).cloned().unwrap_or_default())
    }

    async fn get_latest_price(&self, symbol: &str) -> Result<Option<f64>, AnalysisError> {
        Ok(self.prices.get(symbol).and_then(|bars| bars.last()).map(|b| b.close))
    }
}

pub fn test_state() -> AppState {
    let orchestrator =
        AnalysisOrchestrator::new(Arc::new(StaticMarket::new()), AnalysisConfig::default()).unwrap();
    AppState::new(orchestrator)
}

pub fn test_app() -> Router {
    build_router(test_state())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}
