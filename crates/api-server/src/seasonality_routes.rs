use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use dividend_analysis::SeasonalityReport;

use crate::{analysis_err, cached_json, submit_batch, ApiResponse, AppError, AppState, JobAccepted, UniverseRequest};

pub fn seasonality_routes() -> Router<AppState> {
    Router::new()
        .route("/api/seasonality", get(get_cached))
        .route("/api/seasonality/run", post(run_batch))
        .route("/api/seasonality/:symbol", get(get_seasonality))
}

/// Half-year ex-date windows with a countdown to the next expected date.
async fn get_seasonality(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<SeasonalityReport>>, AppError> {
    let report = state
        .orchestrator
        .seasonality(&symbol, Utc::now().date_naive())
        .await
        .map_err(analysis_err)?;
    Ok(Json(ApiResponse::success(report)))
}

async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<UniverseRequest>,
) -> Json<ApiResponse<JobAccepted>> {
    let accepted = submit_batch(&state, "seasonality", |c| &c.seasonality, move |orchestrator| async move {
        orchestrator
            .seasonality_batch(request.symbols, Utc::now().date_naive())
            .await
    });
    Json(ApiResponse::success(accepted))
}

async fn get_cached(State(state): State<AppState>) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    cached_json(&state.caches.seasonality, "seasonality").await
}
