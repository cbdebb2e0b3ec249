//! Dividend Analysis
//!
//! Ex-dividend-date aligned metrics over daily closes: the capture ratio
//! (T-DTS), the triple-EMA trend return around each event, outlier
//! partitioning, the cross-metric merge that feeds clustering, and
//! ex-date seasonality.

pub mod alignment;
pub mod capture;
pub mod merge;
pub mod outlier;
pub mod seasonality;
pub mod trend;

pub use alignment::{window_bounds, AlignmentError, PriceSeries};
pub use capture::{capture_ratio, capture_ratio_records, CaptureRecord};
pub use merge::{merge_by_stock, merge_features, summarize_trend, StockFeatureVector, TrendSummary};
pub use outlier::{Classified, OutlierTest, PartitionSummary, Partitioned, StockReport};
pub use seasonality::{dividend_seasonality, SeasonWindow, SeasonalityReport};
pub use trend::{trend_return_records, TrendParams, TrendRecord};
