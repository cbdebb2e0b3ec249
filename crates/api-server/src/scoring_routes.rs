//! Universe-wide cluster scoring and background job polling.

use analysis_orchestrator::{
    BatchBundle, BatchError, BatchParams, BatchRequest, JobInfo, JobOutcome, Snapshot, StockFailure,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cluster_scoring::{ScoredStock, ScoredTable};
use dividend_analysis::{CaptureRecord, TrendRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{analysis_err, analysis_status, ApiResponse, AppError, AppState, JobAccepted};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Async,
    Sync,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(flatten)]
    pub batch: BatchRequest,
    #[serde(default)]
    pub mode: RunMode,
}

#[derive(Debug, Default, Deserialize)]
pub struct RescoreRequest {
    pub capture_threshold: Option<f64>,
    pub outlier_threshold: Option<f64>,
    pub k_clusters: Option<usize>,
}

/// Published table without the raw record sets.
#[derive(Serialize)]
pub struct ScoringView<'a> {
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    pub params: &'a BatchParams,
    pub universe_size: usize,
    pub count: usize,
    pub table: &'a ScoredTable,
    pub failures: &'a [StockFailure],
}

impl<'a> ScoringView<'a> {
    fn new(sequence: u64, published_at: DateTime<Utc>, bundle: &'a BatchBundle) -> Self {
        Self {
            sequence,
            published_at,
            params: &bundle.params,
            universe_size: bundle.universe_size,
            count: bundle.table.stocks.len(),
            table: &bundle.table,
            failures: &bundle.failures,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Started(JobAccepted),
    Completed(serde_json::Value),
}

#[derive(Serialize)]
pub struct StockScoreDetail<'a> {
    pub score: &'a ScoredStock,
    pub capture_records: Vec<&'a CaptureRecord>,
    pub trend_records: Vec<&'a TrendRecord>,
}

pub fn scoring_routes() -> Router<AppState> {
    Router::new()
        .route("/api/scoring", get(get_scoring))
        .route("/api/scoring/run", post(run_scoring))
        .route("/api/scoring/rescore", post(rescore))
        .route("/api/scoring/:symbol", get(get_stock_score))
        .route("/api/jobs/:id", get(get_job))
}

fn batch_err(err: BatchError) -> AppError {
    let status = analysis_status(err.analysis_error());
    AppError::with_status(status, err.into())
}

fn no_results() -> AppError {
    AppError::not_found("No scoring results yet; POST /api/scoring/run first")
}

/// Starts a batch. `mode: "sync"` waits and returns the table, the default
/// returns a job id to poll.
async fn run_scoring(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<ApiResponse<RunOutcome>>, AppError> {
    match request.mode {
        RunMode::Sync => {
            let sequence = state.jobs.next_sequence();
            let bundle = state
                .orchestrator
                .run_batch(request.batch)
                .await
                .map_err(batch_err)?;

            let view = serde_json::to_value(ScoringView::new(sequence, Utc::now(), &bundle))?;
            state.caches.scoring.publish(sequence, bundle).await;
            Ok(Json(ApiResponse::success(RunOutcome::Completed(view))))
        }
        RunMode::Async => {
            let orchestrator = state.orchestrator.clone();
            let caches = Arc::clone(&state.caches);
            let batch = request.batch;

            let ticket = state.jobs.submit("scoring", move |sequence| async move {
                let bundle = orchestrator.run_batch(batch).await?;
                let stored = caches.scoring.publish(sequence, bundle).await;
                Ok::<_, BatchError>(JobOutcome::from_publish(stored))
            });
            Ok(Json(ApiResponse::success(RunOutcome::Started(ticket.into()))))
        }
    }
}

async fn get_scoring(State(state): State<AppState>) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let snapshot = state.caches.scoring.read().await.ok_or_else(no_results)?;
    let view = ScoringView::new(snapshot.sequence, snapshot.published_at, &snapshot.value);
    Ok(Json(ApiResponse::success(serde_json::to_value(view)?)))
}

async fn get_stock_score(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let snapshot: Arc<Snapshot<BatchBundle>> = state.caches.scoring.read().await.ok_or_else(no_results)?;
    let stock = analysis_core::canonical_symbol(&symbol);
    let bundle = &snapshot.value;

    let score = bundle
        .table
        .get(&stock)
        .ok_or_else(|| AppError::not_found(format!("{} is not in the scored table", stock)))?;
    let detail = StockScoreDetail {
        score,
        capture_records: bundle.capture_for(&stock),
        trend_records: bundle.trend_for(&stock),
    };
    Ok(Json(ApiResponse::success(serde_json::to_value(detail)?)))
}

/// Re-scores the cached raw records under new thresholds. No refetch.
async fn rescore(
    State(state): State<AppState>,
    Json(request): Json<RescoreRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let snapshot = state.caches.scoring.read().await.ok_or_else(no_results)?;
    let bundle = state
        .orchestrator
        .rescore_bundle(
            &snapshot.value,
            request.capture_threshold,
            request.outlier_threshold,
            request.k_clusters,
        )
        .map_err(analysis_err)?;

    let sequence = state.jobs.next_sequence();
    let view = serde_json::to_value(ScoringView::new(sequence, Utc::now(), &bundle))?;
    state.caches.scoring.publish(sequence, bundle).await;
    Ok(Json(ApiResponse::success(view)))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ApiResponse<JobInfo>>, AppError> {
    let info = state
        .jobs
        .status(&id)
        .ok_or_else(|| AppError::not_found(format!("Unknown job {}", id)))?;
    Ok(Json(ApiResponse::success(info)))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::{get_json, post_json, test_state};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    fn stocks() -> serde_json::Value {
        json!(["AAA", "BBB", "CCC", "DDD"])
    }

    #[tokio::test]
    async fn test_empty_cache_is_not_found() {
        let app = build_router(test_state());
        let (status, body) = get_json(app, "/api/scoring").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_sync_run_publishes_table() {
        let state = test_state();
        let (status, body) = post_json(
            build_router(state.clone()),
            "/api/scoring/run",
            json!({ "mode": "sync", "symbols": stocks(), "k_clusters": 2 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 4);
        assert_eq!(body["data"]["table"]["k"], 2);

        let (status, cached) = get_json(build_router(state.clone()), "/api/scoring").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cached["data"]["table"], body["data"]["table"]);

        let (status, detail) = get_json(build_router(state), "/api/scoring/aaa.bk").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["data"]["score"]["stock"], "AAA");
        assert_eq!(detail["data"]["capture_records"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_async_run_can_be_polled() {
        let state = test_state();
        let (status, body) = post_json(
            build_router(state.clone()),
            "/api/scoring/run",
            json!({ "symbols": stocks() }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "processing");
        let poll = body["data"]["poll"].as_str().unwrap().to_string();

        let mut last = serde_json::Value::Null;
        for _ in 0..200 {
            let (_, job) = get_json(build_router(state.clone()), &poll).await;
            last = job["data"]["status"].clone();
            if last == "done" || last == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(last, "done");

        let (status, _) = get_json(build_router(state), "/api/scoring").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_async_run_behind_newer_table_is_superseded() {
        let state = test_state();
        let newer = state
            .orchestrator
            .run_batch(analysis_orchestrator::BatchRequest {
                symbols: Some(vec!["AAA".into(), "BBB".into(), "CCC".into()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(state.caches.scoring.publish(u64::MAX, newer).await);

        let (_, body) = post_json(build_router(state.clone()), "/api/scoring/run", json!({ "symbols": stocks() })).await;
        let poll = body["data"]["poll"].as_str().unwrap().to_string();

        let mut last = serde_json::Value::Null;
        for _ in 0..200 {
            let (_, job) = get_json(build_router(state.clone()), &poll).await;
            last = job["data"]["status"].clone();
            if last != "pending" && last != "running" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(last, "superseded");

        let (_, cached) = get_json(build_router(state), "/api/scoring").await;
        assert_eq!(cached["data"]["count"], 3);
    }

    #[tokio::test]
    async fn test_failed_batch_reports_stage() {
        let (status, body) = post_json(
            build_router(test_state()),
            "/api/scoring/run",
            json!({ "mode": "sync", "symbols": ["DOWN", "NOPE"] }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("T-DTS"));
    }

    #[tokio::test]
    async fn test_rescore_replaces_table() {
        let state = test_state();
        post_json(
            build_router(state.clone()),
            "/api/scoring/run",
            json!({ "mode": "sync", "symbols": stocks() }),
        )
        .await;

        let (status, body) = post_json(
            build_router(state.clone()),
            "/api/scoring/rescore",
            json!({ "k_clusters": 3 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["table"]["k"], 3);

        let (_, cached) = get_json(build_router(state), "/api/scoring").await;
        assert_eq!(cached["data"]["params"]["k_clusters"], 3);
    }

    #[tokio::test]
    async fn test_rescore_without_cache_is_not_found() {
        let (status, _) = post_json(build_router(test_state()), "/api/scoring/rescore", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let uri = format!("/api/jobs/{}", uuid::Uuid::new_v4());
        let (status, _) = get_json(build_router(test_state()), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
