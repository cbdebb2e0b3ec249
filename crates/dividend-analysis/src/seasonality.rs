//! When in the year a stock usually goes ex-dividend.
//!
//! Events are split into half-years (Jan-Jun, Jul-Dec) so a year with a
//! missing payment does not shift the other one.

use analysis_core::{canonical_symbol, AnalysisError, DividendEvent};
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

/// Leap year used to render day-of-year values as calendar dates.
const REFERENCE_YEAR: i32 = 2000;

/// Statistics for one half-year tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonWindow {
    pub tag: u8,
    pub min_date: String,
    pub max_date: String,
    pub avg_date: String,
    pub data_points: usize,
    /// Days from `today` to the next occurrence of `avg_date`.
    pub days_remaining: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalityReport {
    pub symbol: String,
    pub tag1: Option<SeasonWindow>,
    pub tag2: Option<SeasonWindow>,
}

fn half_year_tag(date: NaiveDate) -> u8 {
    if date.month() <= 6 {
        1
    } else {
        2
    }
}

fn reference_date(day_of_year: u32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(REFERENCE_YEAR, day_of_year)
}

/// Day-of-year rendered as `Mon-DD` in the reference year.
fn day_label(day_of_year: u32) -> String {
    reference_date(day_of_year)
        .map(|d| d.format("%b-%d").to_string())
        .unwrap_or_default()
}

/// Days until the next `month/day` on or after `today`. `None` when that day
/// does not exist in the candidate year (Feb-29 outside a leap year).
fn days_until(month: u32, day: u32, today: NaiveDate) -> Option<i64> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        return Some((this_year - today).num_days());
    }
    let next_year = NaiveDate::from_ymd_opt(today.year() + 1, month, day)?;
    Some((next_year - today).num_days())
}

fn season_window(tag: u8, dates: &[NaiveDate], today: NaiveDate) -> Option<SeasonWindow> {
    let days: Vec<u32> = dates.iter().map(|d| d.ordinal()).collect();
    let min = *days.iter().min()?;
    let max = *days.iter().max()?;
    let mean = days.iter().map(|&d| d as f64).sum::<f64>() / days.len() as f64;
    let avg = mean.round_ties_even() as u32;

    let days_remaining = reference_date(avg).and_then(|d| days_until(d.month(), d.day(), today));

    Some(SeasonWindow {
        tag,
        min_date: day_label(min),
        max_date: day_label(max),
        avg_date: day_label(avg),
        data_points: days.len(),
        days_remaining,
    })
}

/// Seasonality of the non-zero dividends paid in the `lookback_years` before
/// `today`.
pub fn dividend_seasonality(
    symbol: &str,
    dividends: &[DividendEvent],
    today: NaiveDate,
    lookback_years: u32,
) -> Result<SeasonalityReport, AnalysisError> {
    let stock = canonical_symbol(symbol);
    let since = today
        .checked_sub_months(Months::new(lookback_years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN);

    let mut first_half = Vec::new();
    let mut second_half = Vec::new();
    for event in dividends {
        if event.amount == 0.0 || event.date < since || event.date > today {
            continue;
        }
        match half_year_tag(event.date) {
            1 => first_half.push(event.date),
            _ => second_half.push(event.date),
        }
    }

    if first_half.is_empty() && second_half.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "No dividends for {} in the last {} years",
            stock, lookback_years
        )));
    }

    Ok(SeasonalityReport {
        tag1: season_window(1, &first_half, today),
        tag2: season_window(2, &second_half, today),
        symbol: stock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{date, dividend};

    #[test]
    fn test_tags_split_on_half_year() {
        assert_eq!(half_year_tag(date(2023, 6, 30)), 1);
        assert_eq!(half_year_tag(date(2023, 7, 1)), 2);
    }

    #[test]
    fn test_half_day_mean_rounds_to_even() {
        // ordinals 130 and 131 average to 130.5
        let down = vec![dividend(date(2023, 5, 10), 1.0), dividend(date(2024, 5, 10), 1.0)];
        let report = dividend_seasonality("PTT", &down, date(2025, 1, 15), 10).unwrap();
        assert_eq!(report.tag1.unwrap().avg_date, "May-09");

        // ordinals 131 and 132 average to 131.5
        let up = vec![dividend(date(2023, 5, 11), 1.0), dividend(date(2023, 5, 12), 1.0)];
        let report = dividend_seasonality("PTT", &up, date(2025, 1, 15), 10).unwrap();
        assert_eq!(report.tag1.unwrap().avg_date, "May-11");
    }

    #[test]
    fn test_min_max_avg_dates() {
        let divs = vec![
            dividend(date(2021, 3, 1), 1.0),
            dividend(date(2022, 3, 5), 1.0),
            dividend(date(2023, 3, 9), 1.0),
            dividend(date(2023, 8, 20), 0.5),
        ];
        let report = dividend_seasonality("ptt.bk", &divs, date(2024, 1, 15), 10).unwrap();

        assert_eq!(report.symbol, "PTT");
        let tag1 = report.tag1.unwrap();
        assert_eq!(tag1.data_points, 3);
        // ordinals 60, 64, 68 are read back in the leap reference year
        assert_eq!(tag1.min_date, "Feb-29");
        assert_eq!(tag1.max_date, "Mar-08");
        assert_eq!(tag1.avg_date, "Mar-04");
        assert_eq!(tag1.days_remaining, Some(49));

        let tag2 = report.tag2.unwrap();
        assert_eq!(tag2.data_points, 1);
        assert_eq!(tag2.avg_date, "Aug-19");
    }

    #[test]
    fn test_countdown_rolls_to_next_year() {
        assert_eq!(days_until(3, 4, date(2024, 3, 1)), Some(3));
        assert_eq!(days_until(3, 4, date(2024, 3, 4)), Some(0));
        assert_eq!(days_until(3, 4, date(2024, 3, 5)), Some(364));
    }

    #[test]
    fn test_countdown_for_missing_leap_day() {
        assert_eq!(days_until(2, 29, date(2023, 1, 1)), None);
        assert_eq!(days_until(2, 29, date(2024, 1, 1)), Some(59));
    }

    #[test]
    fn test_lookback_and_zero_amounts() {
        let divs = vec![dividend(date(2010, 3, 1), 1.0), dividend(date(2023, 9, 1), 0.0)];
        let err = dividend_seasonality("PTT", &divs, date(2024, 1, 1), 10).unwrap_err();
        assert!(matches!(err, AnalysisError::NoData(_)));
    }
}
