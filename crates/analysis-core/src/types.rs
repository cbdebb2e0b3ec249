use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One daily close. Series of these are ordered by strictly increasing date;
/// non-trading days are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// A cash dividend keyed by its ex-dividend date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub date: NaiveDate,
    pub amount: f64,
}

impl DividendEvent {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

/// Inclusive calendar-year range used to select dividend events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date.year())
    }

    /// Price window needed by the capture-ratio calculator.
    pub fn capture_fetch_window(&self) -> (NaiveDate, NaiveDate) {
        (year_start(self.start), year_end(self.end.saturating_add(1)))
    }

    /// Price window needed by the trend-return calculator: one extra year in
    /// front so the smoothing filter settles before the first event.
    pub fn trend_fetch_window(&self) -> (NaiveDate, NaiveDate) {
        (year_start(self.start.saturating_sub(1)), year_end(self.end.saturating_add(1)))
    }

    /// Dividends falling inside the range, in input order.
    pub fn select(&self, dividends: &[DividendEvent]) -> Vec<DividendEvent> {
        dividends
            .iter()
            .filter(|d| self.contains(d.date))
            .copied()
            .collect()
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}
