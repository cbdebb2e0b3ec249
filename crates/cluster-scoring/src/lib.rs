//! Cluster Scoring
//!
//! Groups stocks by their standardised dividend features with seeded
//! k-means, ranks them by a composite score and names each group after the
//! closest reference profile using an optimal one-to-one assignment.

pub mod assignment;
pub mod kmeans;
pub mod profiles;
pub mod scorer;
pub mod standardize;

pub use assignment::solve as solve_assignment;
pub use kmeans::{KMeans, KMeansFit};
pub use profiles::{default_profiles, fallback_label, ReferenceProfile};
pub use scorer::{composite_score, ClusterScorer, ClusterSummary, ScoredStock, ScoredTable, ScoringConfig};
pub use standardize::Standardizer;

/// Feature space used for clustering: capture ratio, return after, return
/// before.
pub const FEATURE_DIM: usize = 3;

pub type FeaturePoint = [f64; FEATURE_DIM];

pub(crate) fn squared_distance<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
