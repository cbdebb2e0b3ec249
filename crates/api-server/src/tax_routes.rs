//! Dividend tax planning.

use axum::{extract::State, routing::post, Json, Router};
use tax_optimizer::{optimize_dividend_tax, DividendTaxComparison, DividendTaxInput};

use crate::{analysis_err, ApiResponse, AppError, AppState};

pub fn tax_routes() -> Router<AppState> {
    Router::new().route("/api/tax/dividend-credit", post(dividend_credit))
}

/// Final withholding versus claiming the dividend tax credit.
async fn dividend_credit(
    State(state): State<AppState>,
    Json(input): Json<DividendTaxInput>,
) -> Result<Json<ApiResponse<DividendTaxComparison>>, AppError> {
    let comparison = optimize_dividend_tax(&state.tax_calculator, &input).map_err(analysis_err)?;
    Ok(Json(ApiResponse::success(comparison)))
}
