//! Published result sets.
//!
//! Each cache holds one complete snapshot behind an `Arc`. A writer swaps the
//! whole snapshot in; readers clone the `Arc` and never see a half-written
//! table. Snapshots carry the job sequence that produced them, and a publish
//! with an older sequence than the current snapshot is refused so a slow run
//! cannot overwrite a newer one.

use chrono::{DateTime, Utc};
use fundamental_analysis::DdmValuation;
use dividend_analysis::SeasonalityReport;
use serde::Serialize;
use std::sync::Arc;
use technical_analysis::TechnicalSnapshot;
use tokio::sync::RwLock;

use crate::batch::BatchBundle;

#[derive(Debug, Serialize)]
pub struct Snapshot<T> {
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    pub value: T,
}

pub struct SnapshotCache<T> {
    current: RwLock<Option<Arc<Snapshot<T>>>>,
}

impl<T> SnapshotCache<T> {
    pub fn new() -> Self {
        Self { current: RwLock::new(None) }
    }

    pub async fn read(&self) -> Option<Arc<Snapshot<T>>> {
        self.current.read().await.clone()
    }

    /// Replaces the snapshot unless a newer sequence is already published.
    /// Returns whether `value` was stored.
    pub async fn publish(&self, sequence: u64, value: T) -> bool {
        let mut current = self.current.write().await;
        if let Some(existing) = current.as_ref() {
            if existing.sequence > sequence {
                tracing::warn!(
                    "Discarding stale result seq={} (current seq={})",
                    sequence,
                    existing.sequence
                );
                return false;
            }
        }
        *current = Some(Arc::new(Snapshot {
            sequence,
            published_at: Utc::now(),
            value,
        }));
        true
    }
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One cache per batch kind.
#[derive(Default)]
pub struct ResultCaches {
    pub scoring: SnapshotCache<BatchBundle>,
    pub seasonality: SnapshotCache<Vec<SeasonalityReport>>,
    pub technical: SnapshotCache<Vec<TechnicalSnapshot>>,
    pub ddm: SnapshotCache<Vec<DdmValuation>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_until_published() {
        let cache: SnapshotCache<Vec<i32>> = SnapshotCache::new();
        assert!(cache.read().await.is_none());

        assert!(cache.publish(1, vec![1, 2, 3]).await);
        let snap = cache.read().await.unwrap();
        assert_eq!(snap.sequence, 1);
        assert_eq!(snap.value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stale_publish_is_refused() {
        let cache = SnapshotCache::new();
        assert!(cache.publish(5, "new").await);
        assert!(!cache.publish(3, "old").await);
        assert_eq!(cache.read().await.unwrap().value, "new");

        assert!(cache.publish(6, "newer").await);
        assert_eq!(cache.read().await.unwrap().value, "newer");
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot() {
        let cache = SnapshotCache::new();
        cache.publish(1, vec!["a"]).await;
        let held = cache.read().await.unwrap();

        cache.publish(2, vec!["b", "c"]).await;
        assert_eq!(held.value, vec!["a"]);
        assert_eq!(cache.read().await.unwrap().value, vec!["b", "c"]);
    }
}
