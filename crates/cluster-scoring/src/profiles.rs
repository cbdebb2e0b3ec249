use serde::{Deserialize, Serialize};

use crate::assignment::solve;
use crate::{squared_distance, FeaturePoint};

/// Named archetype in standardised feature space
/// (capture ratio, return after, return before).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub label: String,
    pub vector: FeaturePoint,
}

impl ReferenceProfile {
    pub fn new(label: impl Into<String>, vector: FeaturePoint) -> Self {
        Self { label: label.into(), vector }
    }
}

/// Hand-tuned archetypes. Treated as configuration, not derived.
pub fn default_profiles() -> Vec<ReferenceProfile> {
    vec![
        ReferenceProfile::new("Golden Goose (Strong Trend)", [-1.0, 1.0, 0.5]),
        ReferenceProfile::new("Rebound Star (Buy on Dip)", [0.5, 1.0, -1.0]),
        ReferenceProfile::new("Sell on Fact (Neutral)", [0.0, -0.5, 1.0]),
        ReferenceProfile::new("Dividend Trap (Avoid)", [1.5, -1.0, -0.5]),
    ]
}

/// Label for a cluster left without a profile.
pub fn fallback_label(cluster_id: usize) -> String {
    format!("Group {}", cluster_id)
}

pub fn euclidean(a: &FeaturePoint, b: &FeaturePoint) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Optimal one-to-one matching of centroids to profiles by Euclidean
/// distance. Entry `i` is the profile index and distance for centroid `i`.
pub fn match_profiles(centroids: &[FeaturePoint], profiles: &[ReferenceProfile]) -> Vec<Option<(usize, f64)>> {
    let cost: Vec<Vec<f64>> = centroids
        .iter()
        .map(|c| profiles.iter().map(|p| euclidean(c, &p.vector)).collect())
        .collect();

    solve(&cost)
        .into_iter()
        .enumerate()
        .map(|(cluster, profile)| profile.map(|p| (p, cost[cluster][p])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroids_on_profiles_match_themselves() {
        let profiles = default_profiles();
        let mut centroids: Vec<FeaturePoint> = profiles.iter().map(|p| p.vector).collect();
        centroids.reverse();

        let matched = match_profiles(&centroids, &profiles);
        assert_eq!(matched, vec![Some((3, 0.0)), Some((2, 0.0)), Some((1, 0.0)), Some((0, 0.0))]);
    }

    #[test]
    fn test_ambiguous_centroids_stay_injective() {
        // Both centroids sit nearest to the first profile.
        let centroids = [[-0.9, 1.0, 0.5], [-0.8, 0.9, 0.4]];
        let matched = match_profiles(&centroids, &default_profiles());

        let first = matched[0].map(|(p, _)| p);
        let second = matched[1].map(|(p, _)| p);
        assert!(first.is_some() && second.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn test_extra_centroids_get_no_profile() {
        let centroids: Vec<FeaturePoint> = (0..6).map(|i| [i as f64, 0.0, 0.0]).collect();
        let matched = match_profiles(&centroids, &default_profiles());

        assert_eq!(matched.iter().filter(|m| m.is_none()).count(), 2);
        assert_eq!(fallback_label(5), "Group 5");
    }
}
