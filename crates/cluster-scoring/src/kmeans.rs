use analysis_core::AnalysisError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::squared_distance;

/// Seeded k-means with k-means++ initialisation and `n_init` restarts.
///
/// Restart `i` draws from `ChaCha8Rng::seed_from_u64(seed + i)`, so a fit is
/// reproducible for a given seed regardless of how rayon schedules the
/// restarts. The restart with the lowest inertia wins; ties go to the
/// earliest restart.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence bound on total centroid movement, relative to the mean
    /// per-feature variance of the data.
    pub tol: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit<const D: usize> {
    pub centroids: Vec<[f64; D]>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
        }
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fits `min(k, points.len())` clusters.
    pub fn fit<const D: usize>(&self, points: &[[f64; D]]) -> Result<KMeansFit<D>, AnalysisError> {
        if points.is_empty() {
            return Err(AnalysisError::InvalidData("k-means needs at least one point".to_string()));
        }
        if self.k == 0 {
            return Err(AnalysisError::InvalidConfig("k must be at least 1".to_string()));
        }

        let k = self.k.min(points.len());
        let tol = self.tol * mean_variance(points);

        let fits: Vec<KMeansFit<D>> = (0..self.n_init.max(1))
            .into_par_iter()
            .map(|restart| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(restart as u64));
                lloyd(points, k, self.max_iter, tol, &mut rng)
            })
            .collect();

        let mut best: Option<KMeansFit<D>> = None;
        for fit in fits {
            match &best {
                Some(current) if fit.inertia >= current.inertia => {}
                _ => best = Some(fit),
            }
        }
        best.ok_or_else(|| AnalysisError::InvalidData("k-means produced no fit".to_string()))
    }
}

fn mean_variance<const D: usize>(points: &[[f64; D]]) -> f64 {
    if D == 0 {
        return 0.0;
    }
    let n = points.len() as f64;
    let mut total = 0.0;
    for j in 0..D {
        let mean = points.iter().map(|p| p[j]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / D as f64
}

/// Index of the nearest centroid, lowest index on ties.
fn nearest<const D: usize>(point: &[f64; D], centroids: &[[f64; D]]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn kmeans_plus_plus<const D: usize>(points: &[[f64; D]], k: usize, rng: &mut ChaCha8Rng) -> Vec<[f64; D]> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)]);

    let mut closest: Vec<f64> = points.iter().map(|p| squared_distance(p, &centroids[0])).collect();
    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = n - 1;
            for (i, d) in closest.iter().enumerate() {
                cumulative += d;
                if cumulative > target {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            rng.gen_range(0..n)
        };

        let centroid = points[chosen];
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

fn lloyd<const D: usize>(
    points: &[[f64; D]],
    k: usize,
    max_iter: usize,
    tol: f64,
    rng: &mut ChaCha8Rng,
) -> KMeansFit<D> {
    let mut centroids = kmeans_plus_plus(points, k, rng);
    let mut labels = vec![0; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        let distances: Vec<f64> = points
            .iter()
            .zip(labels.iter_mut())
            .map(|(p, label)| {
                let (idx, d) = nearest(p, &centroids);
                *label = idx;
                d
            })
            .collect();

        let mut sums = vec![[0.0; D]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            counts[label] += 1;
            for j in 0..D {
                sums[label][j] += p[j];
            }
        }

        let mut updated = centroids.clone();
        let mut taken = vec![false; points.len()];
        for c in 0..k {
            if counts[c] > 0 {
                for j in 0..D {
                    updated[c][j] = sums[c][j] / counts[c] as f64;
                }
                continue;
            }
            // Empty cluster: move it onto the point farthest from its centre.
            let farthest = distances
                .iter()
                .enumerate()
                .filter(|(i, _)| !taken[*i])
                .fold(None, |acc: Option<(usize, f64)>, (i, &d)| match acc {
                    Some((_, best)) if d <= best => acc,
                    _ => Some((i, d)),
                });
            if let Some((i, _)) = farthest {
                taken[i] = true;
                updated[c] = points[i];
            }
        }

        let shift: f64 = centroids.iter().zip(&updated).map(|(a, b)| squared_distance(a, b)).sum();
        centroids = updated;
        if shift <= tol {
            break;
        }
    }

    let mut inertia = 0.0;
    for (p, label) in points.iter().zip(labels.iter_mut()) {
        let (idx, d) = nearest(p, &centroids);
        *label = idx;
        inertia += d;
    }

    KMeansFit { centroids, labels, inertia, iterations }
}
