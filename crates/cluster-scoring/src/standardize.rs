use statrs::statistics::Statistics;

/// Per-column z-score transform fitted on one population.
///
/// Uses the population standard deviation; a constant column keeps a scale
/// of 1 so it maps to zero instead of NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer<const D: usize> {
    pub mean: [f64; D],
    pub scale: [f64; D],
}

impl<const D: usize> Standardizer<D> {
    /// `None` for an empty population.
    pub fn fit(rows: &[[f64; D]]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let mut mean = [0.0; D];
        let mut scale = [1.0; D];
        for j in 0..D {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            mean[j] = column.iter().mean();
            let std = column.iter().population_std_dev();
            if std.is_finite() && std > 0.0 {
                scale[j] = std;
            }
        }

        Some(Self { mean, scale })
    }

    pub fn transform(&self, row: &[f64; D]) -> [f64; D] {
        let mut out = [0.0; D];
        for j in 0..D {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn fit_transform(rows: &[[f64; D]]) -> Option<(Self, Vec<[f64; D]>)> {
        let scaler = Self::fit(rows)?;
        let scaled = rows.iter().map(|r| scaler.transform(r)).collect();
        Some((scaler, scaled))
    }
}
