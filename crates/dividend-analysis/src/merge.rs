//! Joins clean capture-ratio and trend-return records into one feature row
//! per stock.

use std::collections::BTreeMap;

use analysis_core::{canonical_symbol, round2, round2_opt, AnalysisError, PipelineStage};
use chrono::NaiveDate;
use serde::Serialize;

use crate::capture::CaptureRecord;
use crate::trend::TrendRecord;

/// Per-stock means of the clean event rows that survived the join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockFeatureVector {
    pub stock: String,
    #[serde(serialize_with = "round2")]
    pub mean_yield_pct: f64,
    #[serde(serialize_with = "round2")]
    pub mean_capture_ratio: f64,
    #[serde(serialize_with = "round2_opt")]
    pub mean_return_after_pct: Option<f64>,
    #[serde(serialize_with = "round2_opt")]
    pub mean_return_before_pct: Option<f64>,
    /// Joined rows behind the means.
    pub event_count: usize,
}

impl StockFeatureVector {
    /// All four features present and finite.
    pub fn is_complete(&self) -> bool {
        self.mean_yield_pct.is_finite()
            && self.mean_capture_ratio.is_finite()
            && self.mean_return_after_pct.is_some_and(f64::is_finite)
            && self.mean_return_before_pct.is_some_and(f64::is_finite)
    }
}

/// Trend returns aggregated per stock, without a date dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub stock: String,
    #[serde(serialize_with = "round2")]
    pub mean_return_after_pct: f64,
    #[serde(serialize_with = "round2")]
    pub mean_return_before_pct: f64,
    pub event_count: usize,
}

#[derive(Default)]
struct Accumulator {
    yield_pct: f64,
    capture_ratio: f64,
    return_after_pct: f64,
    return_before_pct: f64,
    count: usize,
}

impl Accumulator {
    fn mean(total: f64, count: usize) -> f64 {
        total / count as f64
    }
}

/// Inner join on (canonical stock, ex-date), then per-stock means of yield,
/// capture ratio, return after and return before. Output is ordered by
/// stock. Stocks without a joined row are absent.
pub fn merge_features(
    capture_clean: &[CaptureRecord],
    trend_clean: &[TrendRecord],
) -> Result<Vec<StockFeatureVector>, AnalysisError> {
    if capture_clean.is_empty() {
        return Err(AnalysisError::MergeEmpty { stage: PipelineStage::CaptureRatio });
    }
    if trend_clean.is_empty() {
        return Err(AnalysisError::MergeEmpty { stage: PipelineStage::TrendReturn });
    }

    let mut trend_by_key: BTreeMap<(String, NaiveDate), Vec<&TrendRecord>> = BTreeMap::new();
    for record in trend_clean {
        trend_by_key
            .entry((canonical_symbol(&record.stock), record.ex_date))
            .or_default()
            .push(record);
    }

    let mut per_stock: BTreeMap<String, Accumulator> = BTreeMap::new();
    for capture in capture_clean {
        let key = (canonical_symbol(&capture.stock), capture.ex_date);
        let Some(matches) = trend_by_key.get(&key) else {
            continue;
        };
        let acc = per_stock.entry(key.0).or_default();
        for trend in matches {
            acc.yield_pct += capture.yield_pct;
            acc.capture_ratio += capture.capture_ratio;
            acc.return_after_pct += trend.return_after_pct;
            acc.return_before_pct += trend.return_before_pct;
            acc.count += 1;
        }
    }

    if per_stock.is_empty() {
        return Err(AnalysisError::MergeEmpty { stage: PipelineStage::Merge });
    }

    Ok(per_stock
        .into_iter()
        .map(|(stock, acc)| StockFeatureVector {
            stock,
            mean_yield_pct: Accumulator::mean(acc.yield_pct, acc.count),
            mean_capture_ratio: Accumulator::mean(acc.capture_ratio, acc.count),
            mean_return_after_pct: Some(Accumulator::mean(acc.return_after_pct, acc.count)),
            mean_return_before_pct: Some(Accumulator::mean(acc.return_before_pct, acc.count)),
            event_count: acc.count,
        })
        .collect())
}

/// Per-stock mean trend returns, ordered by stock.
pub fn summarize_trend(trend_clean: &[TrendRecord]) -> Vec<TrendSummary> {
    let mut per_stock: BTreeMap<String, Accumulator> = BTreeMap::new();
    for record in trend_clean {
        let acc = per_stock.entry(canonical_symbol(&record.stock)).or_default();
        acc.return_after_pct += record.return_after_pct;
        acc.return_before_pct += record.return_before_pct;
        acc.count += 1;
    }

    per_stock
        .into_iter()
        .map(|(stock, acc)| TrendSummary {
            stock,
            mean_return_after_pct: Accumulator::mean(acc.return_after_pct, acc.count),
            mean_return_before_pct: Accumulator::mean(acc.return_before_pct, acc.count),
            event_count: acc.count,
        })
        .collect()
}

/// Left join of per-stock capture means onto trend summaries, keyed on the
/// stock alone. Stocks without a summary keep `None` trend features.
pub fn merge_by_stock(
    capture_clean: &[CaptureRecord],
    trend_summaries: &[TrendSummary],
) -> Result<Vec<StockFeatureVector>, AnalysisError> {
    if capture_clean.is_empty() {
        return Err(AnalysisError::MergeEmpty { stage: PipelineStage::CaptureRatio });
    }

    let summaries: BTreeMap<String, &TrendSummary> = trend_summaries
        .iter()
        .map(|s| (canonical_symbol(&s.stock), s))
        .collect();

    let mut per_stock: BTreeMap<String, Accumulator> = BTreeMap::new();
    for capture in capture_clean {
        let acc = per_stock.entry(canonical_symbol(&capture.stock)).or_default();
        acc.yield_pct += capture.yield_pct;
        acc.capture_ratio += capture.capture_ratio;
        acc.count += 1;
    }

    Ok(per_stock
        .into_iter()
        .map(|(stock, acc)| {
            let summary = summaries.get(&stock);
            StockFeatureVector {
                mean_yield_pct: Accumulator::mean(acc.yield_pct, acc.count),
                mean_capture_ratio: Accumulator::mean(acc.capture_ratio, acc.count),
                mean_return_after_pct: summary.map(|s| s.mean_return_after_pct),
                mean_return_before_pct: summary.map(|s| s.mean_return_before_pct),
                event_count: acc.count,
                stock,
            }
        })
        .collect())
}
