//! Collaborative Recommender
//!
//! Aggregates provider "suggested items" for every liked item into additive
//! votes: each suggested item gains 1 per liked item that suggested it.
//! Suggestion lists are memoized per source item for the session and
//! persisted through the store.

use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::provider::CatalogProvider;
use crate::store::{self, KeyValueStore};
use crate::types::{Item, PlatformSet};

const STORE_PREFIX: &str = "collab:";

/// Persisted suggestion list for one source item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeCacheEntry {
    pub source_item_id: String,
    pub suggestions: Vec<Item>,
}

/// Suggested item with its vote count
#[derive(Debug, Clone)]
pub struct CollaborativeRecommendation {
    pub item: Arc<Item>,
    pub score: f64,
}

impl CollaborativeRecommendation {
    /// Index scores by item id for the scoring engine
    pub fn score_map(recs: &[CollaborativeRecommendation]) -> HashMap<String, f64> {
        recs.iter()
            .map(|r| (r.item.id.clone(), r.score))
            .collect()
    }
}

pub struct CollaborativeRecommender {
    provider: Arc<dyn CatalogProvider>,
    store: Arc<dyn KeyValueStore>,
    suggestions: DashMap<String, Arc<Vec<Arc<Item>>>>,
    max_recommendations: usize,
}

impl CollaborativeRecommender {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        store: Arc<dyn KeyValueStore>,
        max_recommendations: usize,
    ) -> Self {
        Self {
            provider,
            store,
            suggestions: DashMap::new(),
            max_recommendations,
        }
    }

    /// Number of source items with memoized suggestions
    pub fn cached_sources(&self) -> usize {
        self.suggestions.len()
    }

    /// Rank provider suggestions for the liked items.
    ///
    /// Sorted by descending vote count (ties keep first-seen order), capped
    /// at `max_recommendations`. A failed lookup for one liked item is
    /// logged and skipped.
    #[instrument(skip(self, liked_ids, platforms), fields(liked = liked_ids.len(), platforms = %platforms))]
    pub async fn recommend(
        &self,
        liked_ids: &[String],
        platforms: &PlatformSet,
    ) -> Vec<CollaborativeRecommendation> {
        let mut sources: Vec<&str> = Vec::with_capacity(liked_ids.len());
        let mut seen_sources = HashSet::new();
        for id in liked_ids {
            if seen_sources.insert(id.as_str()) {
                sources.push(id.as_str());
            }
        }

        let lookups = sources.iter().map(|id| self.suggestions_for(id));
        let results = join_all(lookups).await;

        let mut order: Vec<String> = Vec::new();
        let mut votes: HashMap<String, CollaborativeRecommendation> = HashMap::new();

        for (source, result) in sources.iter().zip(results) {
            let suggested = match result {
                Ok(list) => list,
                Err(e) => {
                    warn!(source_item_id = %source, error = %e, "Skipping suggestions for liked item");
                    continue;
                }
            };

            let mut counted = HashSet::new();
            for item in suggested.iter().filter(|i| platforms.contains(i.platform)) {
                if !counted.insert(item.id.as_str()) {
                    continue;
                }
                votes
                    .entry(item.id.clone())
                    .and_modify(|rec| rec.score += 1.0)
                    .or_insert_with(|| {
                        order.push(item.id.clone());
                        CollaborativeRecommendation {
                            item: Arc::clone(item),
                            score: 1.0,
                        }
                    });
            }
        }

        let mut recommendations: Vec<CollaborativeRecommendation> = order
            .into_iter()
            .filter_map(|id| votes.remove(&id))
            .collect();
        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(self.max_recommendations);

        debug!(count = recommendations.len(), "Collaborative recommendations ready");
        recommendations
    }

    /// Suggestions for one source item: memory, then store, then provider
    async fn suggestions_for(&self, item_id: &str) -> Result<Arc<Vec<Arc<Item>>>, ProviderError> {
        if let Some(cached) = self.suggestions.get(item_id) {
            return Ok(Arc::clone(cached.value()));
        }

        let key = format!("{}{}", STORE_PREFIX, item_id);
        match store::load_json::<CollaborativeCacheEntry>(self.store.as_ref(), &key).await {
            Ok(Some(entry)) => {
                let list = Arc::new(entry.suggestions.into_iter().map(Arc::new).collect());
                self.suggestions.insert(item_id.to_string(), Arc::clone(&list));
                return Ok(list);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Ignoring persisted suggestions"),
        }

        let fetched = self.provider.fetch_suggestions(item_id).await?;

        let entry = CollaborativeCacheEntry {
            source_item_id: item_id.to_string(),
            suggestions: fetched,
        };
        if let Err(e) = store::save_json(self.store.as_ref(), &key, &entry).await {
            warn!(key = %key, error = %e, "Failed to persist suggestions");
        }

        let list = Arc::new(entry.suggestions.into_iter().map(Arc::new).collect());
        self.suggestions.insert(item_id.to_string(), Arc::clone(&list));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tests::support::{item, numbered_items, ps2, ScriptedProvider};
    use crate::types::Platform;

    fn recommender(provider: Arc<ScriptedProvider>) -> CollaborativeRecommender {
        CollaborativeRecommender::new(provider, Arc::new(MemoryStore::new()), 20)
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_votes_are_additive() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_suggestions("a", vec![item("x", &[]), item("y", &[])])
                .with_suggestions("b", vec![item("x", &[])]),
        );
        let recs = recommender(provider).recommend(&ids(&["a", "b"]), &ps2()).await;

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].item.id, "x");
        assert_eq!(recs[0].score, 2.0);
        assert_eq!(recs[1].item.id, "y");
        assert_eq!(recs[1].score, 1.0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_aggregation() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_failing_suggestions("bad")
                .with_suggestions("good", vec![item("x", &[])]),
        );
        let recs = recommender(provider)
            .recommend(&ids(&["bad", "good"]), &ps2())
            .await;

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item.id, "x");
    }

    #[tokio::test]
    async fn test_filters_to_active_platforms() {
        let mut vita = item("v", &[]);
        vita.platform = Platform::PlayStationVita;
        let provider = Arc::new(
            ScriptedProvider::new().with_suggestions("a", vec![vita, item("p", &[])]),
        );
        let recs = recommender(provider).recommend(&ids(&["a"]), &ps2()).await;

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item.id, "p");
    }

    #[tokio::test]
    async fn test_capped_at_max_recommendations() {
        let provider =
            Arc::new(ScriptedProvider::new().with_suggestions("a", numbered_items("s", 30)));
        let recs = recommender(provider).recommend(&ids(&["a"]), &ps2()).await;
        assert_eq!(recs.len(), 20);
    }

    #[tokio::test]
    async fn test_suggestions_memoized_per_source() {
        let provider = Arc::new(ScriptedProvider::new().with_suggestions("a", vec![item("x", &[])]));
        let cf = recommender(Arc::clone(&provider));

        cf.recommend(&ids(&["a"]), &ps2()).await;
        cf.recommend(&ids(&["a", "a"]), &ps2()).await;

        assert_eq!(provider.suggestion_calls(), 1);
        assert_eq!(cf.cached_sources(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_memoized() {
        let provider = Arc::new(ScriptedProvider::new().with_failing_suggestions("bad"));
        let cf = recommender(Arc::clone(&provider));

        cf.recommend(&ids(&["bad"]), &ps2()).await;
        cf.recommend(&ids(&["bad"]), &ps2()).await;

        assert_eq!(provider.suggestion_calls(), 2);
        assert_eq!(cf.cached_sources(), 0);
    }

    #[tokio::test]
    async fn test_persisted_suggestions_survive_restart() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::new().with_suggestions("a", vec![item("x", &[])]));

        let first = CollaborativeRecommender::new(provider.clone(), store.clone(), 20);
        first.recommend(&ids(&["a"]), &ps2()).await;

        let second = CollaborativeRecommender::new(provider.clone(), store.clone(), 20);
        let recs = second.recommend(&ids(&["a"]), &ps2()).await;

        assert_eq!(recs.len(), 1);
        assert_eq!(provider.suggestion_calls(), 1);
    }

    #[tokio::test]
    async fn test_score_map() {
        let recs = vec![CollaborativeRecommendation {
            item: Arc::new(item("x", &[])),
            score: 3.0,
        }];
        let map = CollaborativeRecommendation::score_map(&recs);
        assert_eq!(map.get("x"), Some(&3.0));
    }
}
