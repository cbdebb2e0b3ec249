use analysis_core::AnalysisError;
use analysis_orchestrator::{
    AnalysisOrchestrator, JobOutcome, JobRegistry, JobTicket, ResultCaches, Snapshot, SnapshotCache,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use polygon_client::PolygonClient;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tax_optimizer::TaxCalculator;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod config;
mod dividend_routes;
mod scoring_routes;
mod seasonality_routes;
mod tax_routes;
mod technical_routes;
mod valuation_routes;

#[cfg(test)]
mod test_support;

pub use config::{LogFormat, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: AnalysisOrchestrator,
    pub caches: Arc<ResultCaches>,
    pub jobs: Arc<JobRegistry>,
    pub tax_calculator: Arc<TaxCalculator>,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            orchestrator,
            caches: Arc::new(ResultCaches::default()),
            jobs: Arc::new(JobRegistry::new()),
            tax_calculator: Arc::new(TaxCalculator::new()),
        }
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler error rendered as an `ApiResponse` with `success: false`.
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!(message.into()))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        } else {
            tracing::debug!("Request rejected ({}): {}", self.status, self.error);
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.error.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Status code for each analysis failure, so a caller can tell "no data"
/// from "empty after merge" from an upstream outage.
pub fn analysis_status(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::NoData(_) => StatusCode::NOT_FOUND,
        AnalysisError::MergeEmpty { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::Fetch { .. } | AnalysisError::ApiError(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::InvalidData(_) | AnalysisError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
    }
}

pub fn analysis_err(err: AnalysisError) -> AppError {
    AppError::with_status(analysis_status(&err), err.into())
}

/// Body of the batch `run` endpoints. No symbols means the SET50.
#[derive(Debug, Default, Deserialize)]
pub struct UniverseRequest {
    pub symbols: Option<Vec<String>>,
}

/// Acknowledgement for work handed to the job registry.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub sequence: u64,
    pub status: &'static str,
    pub poll: String,
}

impl From<JobTicket> for JobAccepted {
    fn from(ticket: JobTicket) -> Self {
        Self {
            job_id: ticket.id,
            sequence: ticket.sequence,
            status: "processing",
            poll: format!("/api/jobs/{}", ticket.id),
        }
    }
}

/// Runs a per-stock batch in the background and publishes a non-empty
/// result to the cache picked by `select`.
pub(crate) fn submit_batch<T, F, Fut>(
    state: &AppState,
    kind: &'static str,
    select: fn(&ResultCaches) -> &SnapshotCache<Vec<T>>,
    run: F,
) -> JobAccepted
where
    T: Send + Sync + 'static,
    F: FnOnce(AnalysisOrchestrator) -> Fut + Send + 'static,
    Fut: Future<Output = Vec<T>> + Send + 'static,
{
    let orchestrator = state.orchestrator.clone();
    let caches = Arc::clone(&state.caches);

    state
        .jobs
        .submit(kind, move |sequence| async move {
            let results = run(orchestrator).await;
            if results.is_empty() {
                return Err(AnalysisError::NoData(format!("No {} results for any stock", kind)));
            }
            let stored = select(&caches).publish(sequence, results).await;
            Ok(JobOutcome::from_publish(stored))
        })
        .into()
}

/// Latest published snapshot of `cache` as JSON.
pub(crate) async fn cached_json<T: Serialize>(
    cache: &SnapshotCache<T>,
    kind: &str,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let snapshot: Arc<Snapshot<T>> = cache
        .read()
        .await
        .ok_or_else(|| AppError::not_found(format!("No {} results yet; run the batch first", kind)))?;
    Ok(Json(ApiResponse::success(serde_json::to_value(&*snapshot)?)))
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(dividend_routes::dividend_routes())
        .merge(scoring_routes::scoring_routes())
        .merge(seasonality_routes::seasonality_routes())
        .merge(technical_routes::technical_routes())
        .merge(valuation_routes::valuation_routes())
        .merge(tax_routes::tax_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_server=info,analysis_orchestrator=info,polygon_client=warn,tower_http=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(config::log_format());

    let config = ServerConfig::from_env()?;
    let provider = Arc::new(PolygonClient::with_settings(config.polygon.clone()));
    let orchestrator = AnalysisOrchestrator::new(provider, config.analysis.clone())?;
    let app = build_router(AppState::new(orchestrator));

    tracing::info!("🚀 API server listening on {}", config.bind_addr);
    tracing::info!(
        "Defaults: years {}-{}, window {}, k={}",
        config.analysis.start_year,
        config.analysis.end_year,
        config.analysis.window,
        config.analysis.k_clusters
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
