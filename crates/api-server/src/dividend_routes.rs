//! Per-stock dividend metrics.

use analysis_core::YearRange;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use dividend_analysis::{CaptureRecord, StockReport, TrendRecord};
use serde::Deserialize;

use crate::{analysis_err, ApiResponse, AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    pub threshold: Option<f64>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub window: Option<usize>,
}

impl StockQuery {
    fn years(&self, state: &AppState) -> YearRange {
        let config = state.orchestrator.config();
        YearRange::new(
            self.start_year.unwrap_or(config.start_year),
            self.end_year.unwrap_or(config.end_year),
        )
    }
}

pub fn dividend_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dividends/:symbol/capture", get(get_capture))
        .route("/api/dividends/:symbol/trend", get(get_trend))
}

/// Capture-ratio (T-DTS) records split at the outlier threshold.
async fn get_capture(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<StockQuery>,
) -> Result<Json<ApiResponse<StockReport<CaptureRecord>>>, AppError> {
    let threshold = query
        .threshold
        .unwrap_or(state.orchestrator.config().per_stock_capture_threshold);

    let report = state
        .orchestrator
        .capture_report(&symbol, threshold, query.years(&state))
        .await
        .map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(report)))
}

/// Triple-EMA trend returns around each ex-date.
async fn get_trend(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<StockQuery>,
) -> Result<Json<ApiResponse<StockReport<TrendRecord>>>, AppError> {
    let config = state.orchestrator.config();
    let threshold = query.threshold.unwrap_or(config.trend_threshold);
    let params = config.trend_params_for(query.window);

    let report = state
        .orchestrator
        .trend_report(&symbol, threshold, query.years(&state), params)
        .await
        .map_err(analysis_err)?;

    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get_json, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_capture_report() {
        let (status, body) = get_json(test_app(), "/api/dividends/aaa.bk/capture?threshold=1000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["symbol"], "AAA");
        assert_eq!(body["data"]["summary"]["total_count"], 3);
        assert_eq!(body["data"]["unclean_data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_trend_report_with_window() {
        let (status, body) = get_json(test_app(), "/api/dividends/BBB/trend?window=10&start_year=2023&end_year=2024").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["summary"]["total_count"], 2);
    }

    #[tokio::test]
    async fn test_unknown_stock_is_not_found() {
        let (status, body) = get_json(test_app(), "/api/dividends/ZZZ/capture").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("ZZZ"));
    }

    #[tokio::test]
    async fn test_reversed_years_are_rejected() {
        let (status, _) = get_json(test_app(), "/api/dividends/AAA/capture?start_year=2024&end_year=2022").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_years_outside_calendar_are_rejected() {
        for uri in [
            "/api/dividends/AAA/trend?start_year=-2147483648&end_year=2024",
            "/api/dividends/AAA/capture?start_year=2022&end_year=2147483647",
        ] {
            let (status, _) = get_json(test_app(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
}
