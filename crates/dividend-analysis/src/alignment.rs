//! Locating event dates inside a daily price series.

use analysis_core::PriceBar;
use chrono::NaiveDate;
use thiserror::Error;

/// Why an event could not be aligned. Callers skip the event; these never
/// escalate on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("{0} is not a trading day in the price series")]
    NotTradingDay(NaiveDate),

    #[error("{0} is the first trading day in the series")]
    FirstTradingDay(NaiveDate),

    #[error("a {window}-day window around position {position} leaves a series of {len} days")]
    OutOfBounds { position: usize, window: usize, len: usize },
}

/// Daily closes with strictly increasing dates.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts by date and keeps the first bar of any duplicated day.
    pub fn from_bars(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Sessions dated inside `[start, end]`.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let bars = self
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect();
        Self { bars }
    }

    pub fn close_at(&self, position: usize) -> Option<f64> {
        self.bars.get(position).map(|b| b.close)
    }

    /// Exact position of `date`. Holidays are not approximated to the
    /// nearest session.
    pub fn position_of(&self, date: NaiveDate) -> Result<usize, AlignmentError> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .map_err(|_| AlignmentError::NotTradingDay(date))
    }

    /// Position of the session before `position`.
    pub fn previous_position(&self, position: usize) -> Result<usize, AlignmentError> {
        match position.checked_sub(1) {
            Some(prev) if position < self.bars.len() => Ok(prev),
            Some(_) => Err(AlignmentError::OutOfBounds { position, window: 1, len: self.bars.len() }),
            None => Err(AlignmentError::FirstTradingDay(self.bars.first().map(|b| b.date).unwrap_or_default())),
        }
    }
}

/// Positions `position - window` and `position + window`, both inside a
/// series of `len` sessions. Never clamps.
pub fn window_bounds(position: usize, window: usize, len: usize) -> Result<(usize, usize), AlignmentError> {
    let out_of_bounds = AlignmentError::OutOfBounds { position, window, len };
    let before = position.checked_sub(window).ok_or(out_of_bounds)?;
    let after = position.checked_add(window).filter(|&a| a < len).ok_or(out_of_bounds)?;
    Ok((before, after))
}
