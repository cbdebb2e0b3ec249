use thiserror::Error;

/// Pipeline stage that ran out of data. Used to tell a caller whether to widen
/// the date range, relax a threshold, or wait for upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Capture-ratio (T-DTS) records.
    CaptureRatio,
    /// Trend-return (TEMA) records.
    TrendReturn,
    /// Inner join of the two metrics.
    Merge,
    /// Feature rows left after dropping incomplete ones.
    Scoring,
}

impl PipelineStage {
    pub fn empty_message(&self) -> &'static str {
        match self {
            PipelineStage::CaptureRatio => "No T-DTS data found for clustering",
            PipelineStage::TrendReturn => "No TEMA data found for clustering",
            PipelineStage::Merge => "Merged data is empty",
            PipelineStage::Scoring => "No complete feature rows left to score",
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No data: {0}")]
    NoData(String),

    #[error("{}", .stage.empty_message())]
    MergeEmpty { stage: PipelineStage },

    #[error("Failed to fetch {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    #[error("Timed out fetching {symbol} after {seconds}s")]
    Timeout { symbol: String, seconds: u64 },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl AnalysisError {
    /// True for the "nothing to compute" family, as opposed to upstream or
    /// configuration failures.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, AnalysisError::NoData(_) | AnalysisError::MergeEmpty { .. })
    }
}
