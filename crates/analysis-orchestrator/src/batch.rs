use analysis_core::{AnalysisError, YearRange};
use cluster_scoring::{ClusterScorer, ScoredTable, ScoringConfig};
use dividend_analysis::{merge_features, CaptureRecord, Partitioned, TrendParams, TrendRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{validate_threshold, validate_years, AnalysisConfig};

/// Batch trigger input. Unset fields take the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub window: Option<usize>,
    /// Bound on trend returns, in percent.
    pub outlier_threshold: Option<f64>,
    /// Bound on capture ratios.
    pub capture_threshold: Option<f64>,
    pub symbols: Option<Vec<String>>,
    pub k_clusters: Option<usize>,
}

/// Parameters a batch actually ran with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchParams {
    pub start_year: i32,
    pub end_year: i32,
    pub window: usize,
    pub span: usize,
    pub capture_threshold: f64,
    pub trend_threshold: f64,
    pub k_clusters: usize,
}

impl BatchParams {
    pub fn resolve(request: &BatchRequest, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let trend = config.trend_params_for(request.window);
        let params = Self {
            start_year: request.start_year.unwrap_or(config.start_year),
            end_year: request.end_year.unwrap_or(config.end_year),
            window: trend.window,
            span: trend.span,
            capture_threshold: request.capture_threshold.unwrap_or(config.capture_threshold),
            trend_threshold: request.outlier_threshold.unwrap_or(config.trend_threshold),
            k_clusters: request.k_clusters.unwrap_or(config.k_clusters),
        };

        validate_years(params.years())?;
        validate_threshold("capture_threshold", params.capture_threshold)?;
        validate_threshold("outlier_threshold", params.trend_threshold)?;
        if params.window == 0 {
            return Err(AnalysisError::InvalidConfig("window must be positive".to_string()));
        }
        if params.k_clusters == 0 {
            return Err(AnalysisError::InvalidConfig("k_clusters must be positive".to_string()));
        }
        Ok(params)
    }

    pub fn years(&self) -> YearRange {
        YearRange::new(self.start_year, self.end_year)
    }

    pub fn trend_params(&self) -> TrendParams {
        TrendParams::new(self.span, self.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Timeout,
    NoCaptureData,
    NoTrendData,
}

/// A stock the batch skipped, in whole or for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockFailure {
    pub symbol: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl StockFailure {
    pub fn new(symbol: &str, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn from_fetch(symbol: &str, err: &AnalysisError) -> Self {
        let kind = match err {
            AnalysisError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Fetch,
        };
        Self::new(symbol, kind, err.to_string())
    }
}

/// Scored table plus every unfiltered record, so a threshold change can be
/// re-scored without touching the data provider.
#[derive(Debug, Clone, Serialize)]
pub struct BatchBundle {
    pub params: BatchParams,
    pub universe_size: usize,
    pub table: ScoredTable,
    pub raw_capture: Vec<CaptureRecord>,
    pub raw_trend: Vec<TrendRecord>,
    pub failures: Vec<StockFailure>,
}

impl BatchBundle {
    pub fn capture_for(&self, stock: &str) -> Vec<&CaptureRecord> {
        self.raw_capture.iter().filter(|r| r.stock == stock).collect()
    }

    pub fn trend_for(&self, stock: &str) -> Vec<&TrendRecord> {
        self.raw_trend.iter().filter(|r| r.stock == stock).collect()
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    InvalidRequest(AnalysisError),

    #[error("{source} ({} of {universe_size} stocks failed)", .failures.len())]
    Scoring {
        source: AnalysisError,
        failures: Vec<StockFailure>,
        universe_size: usize,
    },
}

impl BatchError {
    pub fn analysis_error(&self) -> &AnalysisError {
        match self {
            BatchError::InvalidRequest(e) => e,
            BatchError::Scoring { source, .. } => source,
        }
    }

    pub fn failures(&self) -> &[StockFailure] {
        match self {
            BatchError::InvalidRequest(_) => &[],
            BatchError::Scoring { failures, .. } => failures,
        }
    }
}

/// Partition, merge and score. Pure; shared by fresh batches and re-scoring.
pub fn score_records(
    raw_capture: &[CaptureRecord],
    raw_trend: &[TrendRecord],
    capture_threshold: f64,
    trend_threshold: f64,
    scoring: &ScoringConfig,
) -> Result<ScoredTable, AnalysisError> {
    let capture = Partitioned::new(raw_capture.to_vec(), capture_threshold);
    let trend = Partitioned::new(raw_trend.to_vec(), trend_threshold);

    let capture_summary = capture.summary();
    let trend_summary = trend.summary();
    tracing::debug!(
        "Clean records: capture {}/{}, trend {}/{}",
        capture_summary.clean_count,
        capture_summary.total_count,
        trend_summary.clean_count,
        trend_summary.total_count
    );

    let features = merge_features(&capture.clean_records(), &trend.clean_records())?;
    ClusterScorer::new(scoring.clone()).score(&features)
}
