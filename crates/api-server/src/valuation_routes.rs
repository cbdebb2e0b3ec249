use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use fundamental_analysis::{DdmParams, DdmValuation};
use serde::Deserialize;

use crate::{analysis_err, cached_json, submit_batch, ApiResponse, AppError, AppState, JobAccepted};

#[derive(Debug, Default, Deserialize)]
pub struct DdmQuery {
    pub years: Option<u32>,
    pub r_expected: Option<f64>,
    pub growth_rate: Option<f64>,
}

impl DdmQuery {
    fn params(&self) -> DdmParams {
        let defaults = DdmParams::default();
        DdmParams {
            years: self.years.unwrap_or(defaults.years),
            r_expected: self.r_expected.unwrap_or(defaults.r_expected),
            growth_rate: self.growth_rate.unwrap_or(defaults.growth_rate),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DdmRunRequest {
    pub symbols: Option<Vec<String>>,
    #[serde(flatten)]
    pub params: DdmQuery,
}

pub fn valuation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/valuation/ddm", get(get_cached))
        .route("/api/valuation/ddm/run", post(run_batch))
        .route("/api/valuation/ddm/:symbol", get(get_ddm))
}

/// Dividend-discount target price from the last few years of payouts.
async fn get_ddm(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<DdmQuery>,
) -> Result<Json<ApiResponse<DdmValuation>>, AppError> {
    let valuation = state
        .orchestrator
        .ddm_valuation(&symbol, query.params(), Utc::now().date_naive())
        .await
        .map_err(analysis_err)?;
    Ok(Json(ApiResponse::success(valuation)))
}

async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<DdmRunRequest>,
) -> Json<ApiResponse<JobAccepted>> {
    let params = request.params.params();
    let symbols = request.symbols;
    let accepted = submit_batch(&state, "ddm", |c| &c.ddm, move |orchestrator| async move {
        orchestrator.ddm_batch(symbols, params, Utc::now().date_naive()).await
    });
    Json(ApiResponse::success(accepted))
}

async fn get_cached(State(state): State<AppState>) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    cached_json(&state.caches.ddm, "ddm").await
}
