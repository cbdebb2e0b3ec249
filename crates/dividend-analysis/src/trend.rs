//! Trend return: triple-EMA percentage change in the window before and
//! after each ex-dividend date.

use analysis_core::{canonical_symbol, round2, AnalysisError, DividendEvent, YearRange};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use technical_analysis::tema;

use crate::alignment::{window_bounds, AlignmentError, PriceSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendParams {
    /// Smoothing span of each EMA stage.
    pub span: usize,
    /// Sessions compared on each side of the ex-date.
    pub window: usize,
}

impl TrendParams {
    pub fn new(span: usize, window: usize) -> Self {
        Self { span, window }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRecord {
    pub stock: String,
    pub year: i32,
    pub ex_date: NaiveDate,
    pub dividend: f64,
    #[serde(serialize_with = "round2")]
    pub price_close: f64,
    #[serde(serialize_with = "round2")]
    pub trend_at_event: f64,
    #[serde(serialize_with = "round2")]
    pub trend_before_window: f64,
    #[serde(serialize_with = "round2")]
    pub trend_pre_event: f64,
    #[serde(serialize_with = "round2")]
    pub trend_after_window: f64,
    #[serde(serialize_with = "round2")]
    pub return_before_pct: f64,
    #[serde(serialize_with = "round2")]
    pub return_after_pct: f64,
}

fn measure(
    stock: &str,
    prices: &PriceSeries,
    smoothed: &[f64],
    event: &DividendEvent,
    window: usize,
) -> Result<TrendRecord, AlignmentError> {
    let position = prices.position_of(event.date)?;
    let (before, after) = window_bounds(position, window, smoothed.len())?;

    let trend_before_window = smoothed[before];
    let trend_pre_event = smoothed[position - 1];
    let trend_at_event = smoothed[position];
    let trend_after_window = smoothed[after];

    let return_before_pct = 100.0 * (trend_pre_event - trend_before_window) / trend_before_window;
    let return_after_pct = 100.0 * (trend_after_window - trend_at_event) / trend_at_event;

    Ok(TrendRecord {
        stock: stock.to_string(),
        year: event.date.year(),
        ex_date: event.date,
        dividend: event.amount,
        price_close: prices.close_at(position).unwrap_or(f64::NAN),
        trend_at_event,
        trend_before_window,
        trend_pre_event,
        trend_after_window,
        return_before_pct,
        return_after_pct,
    })
}

/// Trend-return records for every dividend in `years` with a full window
/// of sessions on both sides. `prices` should start a year before
/// `years.start` so the filter has settled. Newest event first.
pub fn trend_return_records(
    symbol: &str,
    prices: &PriceSeries,
    dividends: &[DividendEvent],
    years: YearRange,
    params: TrendParams,
) -> Result<Vec<TrendRecord>, AnalysisError> {
    if params.span == 0 || params.window == 0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "span and window must be positive (span={}, window={})",
            params.span, params.window
        )));
    }

    let stock = canonical_symbol(symbol);
    if prices.is_empty() {
        return Err(AnalysisError::NoData(format!("No price history for {}", stock)));
    }

    let targets = years.select(dividends);
    if targets.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "No dividend data found for {} in {}",
            stock, years
        )));
    }

    let smoothed = tema(&prices.closes(), params.span);

    let mut records = Vec::with_capacity(targets.len());
    for event in &targets {
        match measure(&stock, prices, &smoothed, event, params.window) {
            Ok(record) => records.push(record),
            Err(reason) => tracing::debug!("{}: skipping ex-date {}: {}", stock, event.date, reason),
        }
    }

    if records.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "No data found or insufficient history for {}",
            stock
        )));
    }

    records.sort_by(|a, b| b.ex_date.cmp(&a.ex_date));
    Ok(records)
}
