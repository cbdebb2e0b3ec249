use analysis_orchestrator::TechnicalReport;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{analysis_err, cached_json, submit_batch, ApiResponse, AppError, AppState, JobAccepted, UniverseRequest};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<i64>,
}

pub fn technical_routes() -> Router<AppState> {
    Router::new()
        .route("/api/technical", get(get_cached))
        .route("/api/technical/run", post(run_batch))
        .route("/api/technical/:symbol", get(get_history))
}

/// Daily RSI/MACD rows for charting.
async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<TechnicalReport>>, AppError> {
    let report = state
        .orchestrator
        .technical_history(&symbol, Utc::now().date_naive(), query.days)
        .await
        .map_err(analysis_err)?;
    Ok(Json(ApiResponse::success(report)))
}

/// Latest RSI status and MACD cross across the universe.
async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<UniverseRequest>,
) -> Json<ApiResponse<JobAccepted>> {
    let accepted = submit_batch(&state, "technical", |c| &c.technical, move |orchestrator| async move {
        orchestrator
            .technical_batch(request.symbols, Utc::now().date_naive())
            .await
    });
    Json(ApiResponse::success(accepted))
}

async fn get_cached(State(state): State<AppState>) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    cached_json(&state.caches.technical, "technical").await
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::{get_json, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_history_rows() {
        let (status, body) = get_json(build_router(test_state()), "/api/technical/AAA?days=90").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["days"], 90);
        let rows = body["data"]["data"].as_array().unwrap();
        assert_eq!(body["data"]["count"], rows.len());
        assert!(!rows.is_empty());
        assert!(rows[0]["momentum"].is_string());
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_days() {
        for uri in ["/api/technical/AAA?days=0", "/api/technical/AAA?days=1000000000000"] {
            let (status, _) = get_json(build_router(test_state()), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_empty_cache() {
        let (status, _) = get_json(build_router(test_state()), "/api/technical").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
