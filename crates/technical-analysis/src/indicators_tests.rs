#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use super::super::snapshot::*;
    use analysis_core::PriceBar;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to turn closes into consecutive daily bars
    fn bars_from(prices: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar::new(start + Duration::days(i as i64), close))
            .collect()
    }

    #[test]
    fn test_ema_seeds_with_first_value() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        assert_eq!(result[0], 22.0);
        // alpha = 0.5 for span 3
        assert_abs_diff_eq!(result[1], 23.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result[2], 23.0, epsilon = 1e-12);
        assert_abs_diff_eq!(result[3], 24.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ema_empty_data() {
        let data: Vec<f64> = vec![];
        let result = ema(&data, 5);

        assert_eq!(result.len(), 0);
    }

    #[test]
    fn test_ema_zero_span() {
        assert!(ema(&sample_prices(), 0).is_empty());
    }

    #[test]
    fn test_ema_increases_with_uptrend() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = ema(&data, 3);

        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_tema_constant_series_is_fixed_point() {
        let data = vec![37.5; 60];
        let result = tema(&data, 15);

        assert_eq!(result.len(), data.len());
        for value in result {
            assert_abs_diff_eq!(value, 37.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_tema_tracks_trend_closer_than_ema() {
        let data: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let single = ema(&data, 10);
        let triple = tema(&data, 10);

        let last = data[data.len() - 1];
        let ema_lag = last - single[single.len() - 1];
        let tema_lag = last - triple[triple.len() - 1];
        assert!(tema_lag.abs() < ema_lag.abs());
    }

    #[test]
    fn test_rsi_bounds_and_alignment() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert_eq!(result.len(), prices.len());
        assert!(result[..13].iter().all(|v| v.is_none()));
        assert!(result[13].is_some());
        for value in result[13..].iter().flatten() {
            assert!(*value >= 0.0 && *value <= 100.0);
        }
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        let result = rsi(&data, 14);

        assert!(result.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_rsi_overbought_on_pure_uptrend() {
        let uptrend: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();

        let result = rsi(&uptrend, 14);
        assert_eq!(result.last().copied().flatten(), Some(100.0));
    }

    #[test]
    fn test_rsi_flat_series_is_undefined() {
        let flat = vec![10.0; 20];
        assert!(rsi(&flat, 14).iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_macd_aligned_with_input() {
        let prices = sample_prices();
        let result = macd(&prices, 12, 26, 9);

        assert_eq!(result.macd_line.len(), prices.len());
        assert_eq!(result.signal_line.len(), prices.len());
        assert_eq!(result.histogram.len(), prices.len());
        assert_eq!(result.macd_line[0], 0.0);
    }

    #[test]
    fn test_macd_histogram() {
        let prices = sample_prices();
        let result = macd(&prices, 12, 26, 9);

        for (i, &hist) in result.histogram.iter().enumerate() {
            assert_abs_diff_eq!(hist, result.macd_line[i] - result.signal_line[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let result = macd(&sample_prices(), 26, 12, 9);
        assert!(result.macd_line.is_empty());
    }

    #[test]
    fn test_history_skips_rsi_warmup() {
        let bars = bars_from(&sample_prices());
        let history = technical_history(&bars);

        assert_eq!(history.len(), bars.len() - (RSI_PERIOD - 1));
        assert_eq!(history[0].date, bars[RSI_PERIOD - 1].date);
    }

    #[test]
    fn test_snapshot_too_short() {
        let bars = bars_from(&sample_prices()[..10]);
        assert!(technical_snapshot("PTT", &bars).is_none());
    }

    #[test]
    fn test_snapshot_uptrend_is_overbought_without_cross() {
        let prices: Vec<f64> = (0..60).map(|i| 50.0 + i as f64 * 0.5).collect();
        let snapshot = technical_snapshot("AOT", &bars_from(&prices)).unwrap();

        assert_eq!(snapshot.symbol, "AOT");
        assert_eq!(snapshot.rsi_status, RsiStatus::Overbought);
        assert_eq!(snapshot.macd_signal, MacdCross::Neutral);
        assert!(snapshot.macd_histogram > 0.0);
    }

    #[test]
    fn test_snapshot_detects_golden_cross() {
        let mut prices: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
        prices.extend((1..40).map(|i| 61.0 + 2.0 * i as f64));
        let bars = bars_from(&prices);

        let history = technical_history(&bars);
        let cross_row = history
            .windows(2)
            .position(|w| w[0].histogram <= 0.0 && w[1].histogram > 0.0)
            .expect("series should cross upward")
            + 1;
        let cross_date = history[cross_row].date;
        let cut = bars.iter().position(|b| b.date == cross_date).unwrap();

        let snapshot = technical_snapshot("KBANK", &bars[..=cut]).unwrap();
        assert_eq!(snapshot.macd_signal, MacdCross::GoldenCross);
        assert_eq!(snapshot.date, cross_date);
    }

    #[test]
    fn test_rsi_status_thresholds() {
        assert_eq!(RsiStatus::from_rsi(70.0), RsiStatus::Overbought);
        assert_eq!(RsiStatus::from_rsi(30.0), RsiStatus::Oversold);
        assert_eq!(RsiStatus::from_rsi(50.0), RsiStatus::Neutral);
    }
}
