use analysis_core::{round2, round4, AnalysisError, PipelineStage};
use dividend_analysis::StockFeatureVector;
use serde::{Deserialize, Serialize};

use crate::kmeans::KMeans;
use crate::profiles::{default_profiles, fallback_label, match_profiles, ReferenceProfile};
use crate::standardize::Standardizer;
use crate::FeaturePoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub k_clusters: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
    pub profiles: Vec<ReferenceProfile>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            k_clusters: 4,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            profiles: default_profiles(),
        }
    }
}

/// One ranked stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredStock {
    pub stock: String,
    #[serde(serialize_with = "round2")]
    pub mean_yield_pct: f64,
    #[serde(serialize_with = "round4")]
    pub mean_capture_ratio: f64,
    #[serde(serialize_with = "round2")]
    pub mean_return_after_pct: f64,
    #[serde(serialize_with = "round2")]
    pub mean_return_before_pct: f64,
    pub event_count: usize,
    pub cluster_id: usize,
    #[serde(serialize_with = "round2")]
    pub composite_score: f64,
    pub cluster_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub label: String,
    /// Centroid in standardised feature space.
    pub centroid: FeaturePoint,
    /// Distance to the matched profile, `None` for fallback labels.
    pub match_distance: Option<f64>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTable {
    pub k: usize,
    /// Sorted by composite score, best first.
    pub stocks: Vec<ScoredStock>,
    pub clusters: Vec<ClusterSummary>,
}

impl ScoredTable {
    pub fn get(&self, stock: &str) -> Option<&ScoredStock> {
        self.stocks.iter().find(|s| s.stock == stock)
    }
}

/// `yield * (1 - capture) + return_after`.
pub fn composite_score(mean_yield_pct: f64, mean_capture_ratio: f64, mean_return_after_pct: f64) -> f64 {
    mean_yield_pct * (1.0 - mean_capture_ratio) + mean_return_after_pct
}

pub struct ClusterScorer {
    config: ScoringConfig,
}

struct CompleteRow<'a> {
    source: &'a StockFeatureVector,
    after: f64,
    before: f64,
}

impl ClusterScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Clusters and ranks the complete rows of `features`. Rows with a
    /// missing feature are dropped, not imputed.
    pub fn score(&self, features: &[StockFeatureVector]) -> Result<ScoredTable, AnalysisError> {
        if features.is_empty() {
            return Err(AnalysisError::MergeEmpty { stage: PipelineStage::Merge });
        }

        let rows: Vec<CompleteRow> = features
            .iter()
            .filter(|f| f.is_complete())
            .filter_map(|f| {
                Some(CompleteRow {
                    after: f.mean_return_after_pct?,
                    before: f.mean_return_before_pct?,
                    source: f,
                })
            })
            .collect();

        let dropped = features.len() - rows.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} incomplete feature rows before scoring", dropped);
        }

        let points: Vec<FeaturePoint> = rows
            .iter()
            .map(|r| [r.source.mean_capture_ratio, r.after, r.before])
            .collect();
        let (_, scaled) = Standardizer::fit_transform(&points)
            .ok_or(AnalysisError::MergeEmpty { stage: PipelineStage::Scoring })?;

        let k = self.config.k_clusters.max(1).min(scaled.len());
        let fit = KMeans::new(k, self.config.seed)
            .with_n_init(self.config.n_init)
            .with_max_iter(self.config.max_iter)
            .fit(&scaled)?;

        let matched = match_profiles(&fit.centroids, &self.config.profiles);
        let clusters: Vec<ClusterSummary> = fit
            .centroids
            .iter()
            .enumerate()
            .map(|(id, centroid)| {
                let (label, match_distance) = match matched.get(id).copied().flatten() {
                    Some((profile, distance)) => (self.config.profiles[profile].label.clone(), Some(distance)),
                    None => (fallback_label(id), None),
                };
                ClusterSummary {
                    cluster_id: id,
                    label,
                    centroid: *centroid,
                    match_distance,
                    size: fit.labels.iter().filter(|&&l| l == id).count(),
                }
            })
            .collect();

        let mut stocks: Vec<ScoredStock> = rows
            .iter()
            .zip(&fit.labels)
            .map(|(row, &cluster_id)| {
                let f = row.source;
                ScoredStock {
                    stock: f.stock.clone(),
                    mean_yield_pct: f.mean_yield_pct,
                    mean_capture_ratio: f.mean_capture_ratio,
                    mean_return_after_pct: row.after,
                    mean_return_before_pct: row.before,
                    event_count: f.event_count,
                    cluster_id,
                    composite_score: composite_score(f.mean_yield_pct, f.mean_capture_ratio, row.after),
                    cluster_label: clusters[cluster_id].label.clone(),
                }
            })
            .collect();

        stocks.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| a.stock.cmp(&b.stock))
        });

        tracing::info!("Scored {} stocks into {} clusters", stocks.len(), k);
        Ok(ScoredTable { k, stocks, clusters })
    }
}
