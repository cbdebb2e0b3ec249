//! Capture ratio (T-DTS): how much of the dividend the ex-date price drop
//! gives back.

use analysis_core::{canonical_symbol, round2, round4, AnalysisError, DividendEvent, YearRange};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::alignment::{AlignmentError, PriceSeries};

/// One ex-dividend event measured against the previous session's close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureRecord {
    pub stock: String,
    pub year: i32,
    pub ex_date: NaiveDate,
    pub dividend: f64,
    #[serde(serialize_with = "round2")]
    pub price_before: f64,
    #[serde(serialize_with = "round2")]
    pub price_at: f64,
    #[serde(serialize_with = "round2")]
    pub yield_pct: f64,
    #[serde(serialize_with = "round2")]
    pub price_drop_pct: f64,
    #[serde(serialize_with = "round4")]
    pub capture_ratio: f64,
}

/// Price drop relative to yield. A zero yield gives a zero ratio.
pub fn capture_ratio(price_drop_pct: f64, yield_pct: f64) -> f64 {
    if yield_pct != 0.0 {
        price_drop_pct / yield_pct
    } else {
        0.0
    }
}

fn measure(
    stock: &str,
    prices: &PriceSeries,
    event: &DividendEvent,
) -> Result<CaptureRecord, AlignmentError> {
    let position = prices.position_of(event.date)?;
    let before = prices.previous_position(position)?;

    let price_at = prices.close_at(position).ok_or(AlignmentError::NotTradingDay(event.date))?;
    let price_before = prices.close_at(before).ok_or(AlignmentError::FirstTradingDay(event.date))?;

    let yield_pct = 100.0 * event.amount / price_before;
    let price_drop_pct = 100.0 * (price_before - price_at) / price_before;

    Ok(CaptureRecord {
        stock: stock.to_string(),
        year: event.date.year(),
        ex_date: event.date,
        dividend: event.amount,
        price_before,
        price_at,
        yield_pct,
        price_drop_pct,
        capture_ratio: capture_ratio(price_drop_pct, yield_pct),
    })
}

/// Capture-ratio records for every dividend in `years` whose ex-date is a
/// trading day with a previous session. Newest event first.
pub fn capture_ratio_records(
    symbol: &str,
    prices: &PriceSeries,
    dividends: &[DividendEvent],
    years: YearRange,
) -> Result<Vec<CaptureRecord>, AnalysisError> {
    let stock = canonical_symbol(symbol);
    let targets = years.select(dividends);

    if targets.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "No dividend data found for {} in {}",
            stock, years
        )));
    }

    let mut records = Vec::with_capacity(targets.len());
    for event in &targets {
        match measure(&stock, prices, event) {
            Ok(record) => records.push(record),
            Err(reason) => tracing::debug!("{}: skipping ex-date {}: {}", stock, event.date, reason),
        }
    }

    if records.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "Insufficient price data around XD dates for {}",
            stock
        )));
    }

    records.sort_by(|a, b| b.ex_date.cmp(&a.ex_date));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bars, date, dividend};
    use approx::assert_relative_eq;

    fn series() -> PriceSeries {
        // 2023-03-01 .. 2023-03-06
        PriceSeries::from_bars(bars(date(2023, 3, 1), &[98.0, 100.0, 95.0, 96.0, 97.0, 97.5]))
    }

    #[test]
    fn test_five_percent_drop_on_five_percent_yield() {
        let divs = vec![dividend(date(2023, 3, 3), 5.0)];
        let records = capture_ratio_records("ptt.bk", &series(), &divs, YearRange::new(2023, 2023)).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.stock, "PTT");
        assert_eq!(r.year, 2023);
        assert_eq!(r.price_before, 100.0);
        assert_eq!(r.price_at, 95.0);
        assert_relative_eq!(r.yield_pct, 5.0);
        assert_relative_eq!(r.price_drop_pct, 5.0);
        assert_relative_eq!(r.capture_ratio, 1.0);
    }

    #[test]
    fn test_zero_yield_gives_zero_ratio() {
        assert_eq!(capture_ratio(3.0, 0.0), 0.0);
        assert_eq!(capture_ratio(0.0, 0.0), 0.0);
        assert_relative_eq!(capture_ratio(-2.0, 4.0), -0.5);
    }

    #[test]
    fn test_holiday_and_first_day_events_are_skipped() {
        let divs = vec![
            dividend(date(2023, 3, 1), 1.0),  // first session
            dividend(date(2023, 3, 10), 1.0), // not in the series
            dividend(date(2023, 3, 5), 2.0),
        ];
        let records = capture_ratio_records("SCB", &series(), &divs, YearRange::new(2023, 2023)).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ex_date, date(2023, 3, 5));
    }

    #[test]
    fn test_no_dividends_in_range_is_no_data() {
        let divs = vec![dividend(date(2021, 3, 3), 5.0)];
        let err = capture_ratio_records("SCB", &series(), &divs, YearRange::new(2023, 2024)).unwrap_err();

        assert!(matches!(err, AnalysisError::NoData(ref msg) if msg.contains("No dividend data")));
    }

    #[test]
    fn test_no_alignable_event_is_no_data() {
        let divs = vec![dividend(date(2023, 3, 1), 5.0)];
        let err = capture_ratio_records("SCB", &series(), &divs, YearRange::new(2023, 2023)).unwrap_err();

        assert!(matches!(err, AnalysisError::NoData(ref msg) if msg.contains("Insufficient price data")));
    }

    #[test]
    fn test_records_newest_first() {
        let divs = vec![dividend(date(2023, 3, 3), 1.0), dividend(date(2023, 3, 5), 1.0)];
        let records = capture_ratio_records("SCB", &series(), &divs, YearRange::new(2023, 2023)).unwrap();

        assert_eq!(records[0].ex_date, date(2023, 3, 5));
        assert_eq!(records[1].ex_date, date(2023, 3, 3));
    }

    #[test]
    fn test_serialized_precision() {
        let divs = vec![dividend(date(2023, 3, 4), 0.333)];
        let records = capture_ratio_records("SCB", &series(), &divs, YearRange::new(2023, 2023)).unwrap();
        let json = serde_json::to_value(&records[0]).unwrap();

        // 100 * 0.333 / 95 = 0.35052...
        assert_eq!(json["yield_pct"], 0.35);
        assert_eq!(json["ex_date"], "2023-03-04");
    }
}
