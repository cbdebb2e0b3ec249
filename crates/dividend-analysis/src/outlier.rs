//! Clean/outlier partitioning against a symmetric percentage threshold.
//!
//! Partitioning is a view over the full record set: nothing is dropped, the
//! caller decides which side to aggregate.

use serde::Serialize;

use crate::capture::CaptureRecord;
use crate::trend::TrendRecord;

/// Symmetric bound test. Non-finite values are never inside the bound.
fn exceeds(value: f64, threshold: f64) -> bool {
    !value.is_finite() || value.abs() > threshold
}

pub trait OutlierTest {
    fn is_outlier(&self, threshold: f64) -> bool;
}

impl OutlierTest for CaptureRecord {
    fn is_outlier(&self, threshold: f64) -> bool {
        exceeds(self.capture_ratio, threshold)
    }
}

impl OutlierTest for TrendRecord {
    fn is_outlier(&self, threshold: f64) -> bool {
        exceeds(self.return_before_pct, threshold) || exceeds(self.return_after_pct, threshold)
    }
}

/// A record together with its outlier flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classified<T> {
    #[serde(flatten)]
    pub record: T,
    pub is_outlier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub total_count: usize,
    pub clean_count: usize,
    pub unclean_count: usize,
}

#[derive(Debug, Clone)]
pub struct Partitioned<T> {
    threshold: f64,
    records: Vec<Classified<T>>,
}

impl<T: OutlierTest> Partitioned<T> {
    pub fn new(records: Vec<T>, threshold: f64) -> Self {
        let records = records
            .into_iter()
            .map(|record| {
                let is_outlier = record.is_outlier(threshold);
                Classified { record, is_outlier }
            })
            .collect();
        Self { threshold, records }
    }
}

impl<T> Partitioned<T> {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Every record, in input order.
    pub fn records(&self) -> &[Classified<T>] {
        &self.records
    }

    pub fn clean(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter(|c| !c.is_outlier).map(|c| &c.record)
    }

    pub fn outliers(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter(|c| c.is_outlier).map(|c| &c.record)
    }

    pub fn summary(&self) -> PartitionSummary {
        let unclean_count = self.records.iter().filter(|c| c.is_outlier).count();
        PartitionSummary {
            total_count: self.records.len(),
            clean_count: self.records.len() - unclean_count,
            unclean_count,
        }
    }
}

impl<T: Clone> Partitioned<T> {
    pub fn clean_records(&self) -> Vec<T> {
        self.clean().cloned().collect()
    }

    pub fn into_report(self, symbol: impl Into<String>) -> StockReport<T> {
        let summary = self.summary();
        let clean_data = self.clean_records();
        let unclean_data = self.outliers().cloned().collect();
        let raw_data = self.records.into_iter().map(|c| c.record).collect();

        StockReport {
            symbol: symbol.into(),
            threshold: self.threshold,
            summary,
            raw_data,
            clean_data,
            unclean_data,
        }
    }
}

/// Per-stock query result: the full record set plus both sides of the split.
#[derive(Debug, Clone, Serialize)]
pub struct StockReport<T> {
    pub symbol: String,
    pub threshold: f64,
    pub summary: PartitionSummary,
    pub raw_data: Vec<T>,
    pub clean_data: Vec<T>,
    pub unclean_data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::date;

    fn capture(ratio: f64) -> CaptureRecord {
        CaptureRecord {
            stock: "PTT".to_string(),
            year: 2023,
            ex_date: date(2023, 3, 3),
            dividend: 5.0,
            price_before: 100.0,
            price_at: 95.0,
            yield_pct: 5.0,
            price_drop_pct: 5.0 * ratio,
            capture_ratio: ratio,
        }
    }

    fn trend(before: f64, after: f64) -> TrendRecord {
        TrendRecord {
            stock: "PTT".to_string(),
            year: 2023,
            ex_date: date(2023, 3, 3),
            dividend: 1.0,
            price_close: 30.0,
            trend_at_event: 30.0,
            trend_before_window: 30.0,
            trend_pre_event: 30.0,
            trend_after_window: 30.0,
            return_before_pct: before,
            return_after_pct: after,
        }
    }

    #[test]
    fn test_capture_ratio_one_is_outlier_at_half() {
        assert!(capture(1.0).is_outlier(0.5));
        assert!(!capture(1.0).is_outlier(1.0));
        assert!(capture(-1.5).is_outlier(1.0));
        assert!(!capture(-0.2).is_outlier(0.5));
    }

    #[test]
    fn test_trend_either_side_flags_record() {
        assert!(!trend(5.0, -5.0).is_outlier(20.0));
        assert!(trend(25.0, 0.0).is_outlier(20.0));
        assert!(trend(0.0, -20.5).is_outlier(20.0));
    }

    #[test]
    fn test_non_finite_values_are_outliers() {
        assert!(capture(f64::NAN).is_outlier(20.0));
        assert!(capture(f64::INFINITY).is_outlier(20.0));
        assert!(trend(f64::NAN, 0.0).is_outlier(20.0));
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let ratios = [-3.0, -0.5, 0.0, 0.4, 0.5, 0.51, 2.0, f64::NAN];
        let records: Vec<CaptureRecord> = ratios.iter().map(|&r| capture(r)).collect();

        for threshold in [0.0, 0.5, 1.0, 10.0] {
            let partitioned = Partitioned::new(records.clone(), threshold);
            let summary = partitioned.summary();

            assert_eq!(summary.total_count, records.len());
            assert_eq!(summary.clean_count + summary.unclean_count, summary.total_count);
            assert_eq!(partitioned.clean().count(), summary.clean_count);
            assert_eq!(partitioned.outliers().count(), summary.unclean_count);

            for classified in partitioned.records() {
                assert_eq!(classified.is_outlier, classified.record.is_outlier(threshold));
                let in_clean = partitioned.clean().any(|r| std::ptr::eq(r, &classified.record));
                let in_outliers = partitioned.outliers().any(|r| std::ptr::eq(r, &classified.record));
                assert!(in_clean ^ in_outliers);
            }
        }
    }

    #[test]
    fn test_report_keeps_raw_data() {
        let records = vec![capture(0.9), capture(1.2), capture(-4.0)];
        let report = Partitioned::new(records, 1.0).into_report("PTT");

        assert_eq!(report.raw_data.len(), 3);
        assert_eq!(report.clean_data.len(), 1);
        assert_eq!(report.unclean_data.len(), 2);
        assert_eq!(report.summary, PartitionSummary { total_count: 3, clean_count: 1, unclean_count: 2 });
    }

    #[test]
    fn test_classified_serializes_flat() {
        let partitioned = Partitioned::new(vec![capture(1.0)], 0.5);
        let json = serde_json::to_value(&partitioned.records()[0]).unwrap();

        assert_eq!(json["stock"], "PTT");
        assert_eq!(json["is_outlier"], true);
        assert_eq!(json["capture_ratio"], 1.0);
    }
}
