//! Per-day indicator history and latest-value snapshots.

use analysis_core::{round2, round4, PriceBar};
use chrono::NaiveDate;
use serde::Serialize;

use crate::indicators::{macd, rsi};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Momentum {
    Bullish,
    Bearish,
    Neutral,
}

impl Momentum {
    fn from_histogram(hist: f64) -> Self {
        if hist > 0.0 {
            Momentum::Bullish
        } else if hist < 0.0 {
            Momentum::Bearish
        } else {
            Momentum::Neutral
        }
    }
}

/// One trading day with its indicator values.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalRow {
    pub date: NaiveDate,
    #[serde(serialize_with = "round2")]
    pub close: f64,
    #[serde(serialize_with = "round2")]
    pub rsi: f64,
    #[serde(serialize_with = "round4")]
    pub macd: f64,
    #[serde(serialize_with = "round4")]
    pub signal: f64,
    #[serde(serialize_with = "round4")]
    pub histogram: f64,
    pub momentum: Momentum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiStatus {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiStatus {
    pub fn from_rsi(value: f64) -> Self {
        if value >= 70.0 {
            RsiStatus::Overbought
        } else if value <= 30.0 {
            RsiStatus::Oversold
        } else {
            RsiStatus::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacdCross {
    #[serde(rename = "Golden Cross (Buy)")]
    GoldenCross,
    #[serde(rename = "Dead Cross (Sell)")]
    DeadCross,
    Neutral,
}

/// Latest indicator state for one stock.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    #[serde(serialize_with = "round2")]
    pub close: f64,
    #[serde(serialize_with = "round2")]
    pub rsi: f64,
    pub rsi_status: RsiStatus,
    pub macd_signal: MacdCross,
    #[serde(serialize_with = "round4")]
    pub macd_histogram: f64,
}

/// Indicator rows for every day past the RSI warm-up.
pub fn technical_history(bars: &[PriceBar]) -> Vec<TechnicalRow> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi_values = rsi(&closes, RSI_PERIOD);
    let macd_result = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);

    bars.iter()
        .enumerate()
        .filter_map(|(i, bar)| {
            let rsi = rsi_values.get(i).copied().flatten()?;
            let histogram = *macd_result.histogram.get(i)?;
            Some(TechnicalRow {
                date: bar.date,
                close: bar.close,
                rsi,
                macd: macd_result.macd_line[i],
                signal: macd_result.signal_line[i],
                histogram,
                momentum: Momentum::from_histogram(histogram),
            })
        })
        .collect()
}

/// Latest RSI status and the MACD cross between the last two sessions.
/// `None` when the series is too short to have two indicator rows.
pub fn technical_snapshot(symbol: &str, bars: &[PriceBar]) -> Option<TechnicalSnapshot> {
    let history = technical_history(bars);
    let last = history.last()?;
    let prev = history.get(history.len().checked_sub(2)?)?;

    let macd_signal = if last.macd > last.signal && prev.macd <= prev.signal {
        MacdCross::GoldenCross
    } else if last.macd < last.signal && prev.macd >= prev.signal {
        MacdCross::DeadCross
    } else {
        MacdCross::Neutral
    };

    Some(TechnicalSnapshot {
        symbol: symbol.to_string(),
        date: last.date,
        close: last.close,
        rsi: last.rsi,
        rsi_status: RsiStatus::from_rsi(last.rsi),
        macd_signal,
        macd_histogram: last.histogram,
    })
}
