//! Queue Builder
//!
//! Filter → full shuffle → score → sort → partial re-shuffle. Users without
//! history still get scored (bonuses and noise only) but the sorted list is
//! shuffled end to end.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::cache::CatalogCache;
use crate::collaborative::{CollaborativeRecommendation, CollaborativeRecommender};
use crate::error::Result;
use crate::random::{shuffle, RandomSource};
use crate::scoring::{ScoringContext, ScoringEngine};
use crate::types::{Item, PlatformSet, PreferenceVector, UserState};

pub struct QueueBuilder {
    cache: Arc<CatalogCache>,
    collaborative: Arc<CollaborativeRecommender>,
    scoring: ScoringEngine,
    rng: Arc<dyn RandomSource>,
}

impl QueueBuilder {
    pub fn new(
        cache: Arc<CatalogCache>,
        collaborative: Arc<CollaborativeRecommender>,
        scoring: ScoringEngine,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            cache,
            collaborative,
            scoring,
            rng,
        }
    }

    /// Ordered queue for `platforms`, excluding seen and rejected items
    #[instrument(skip(self, platforms, state), fields(platforms = %platforms, history = state.has_history()))]
    pub async fn build(&self, platforms: &PlatformSet, state: &UserState) -> Result<Vec<Arc<Item>>> {
        let catalog = self.cache.fetch(platforms, false).await?;

        let mut emitted = HashSet::new();
        let mut candidates: Vec<Arc<Item>> = catalog
            .iter()
            .filter(|item| !state.is_excluded(&item.id))
            .filter(|item| emitted.insert(item.id.clone()))
            .cloned()
            .collect();

        shuffle(&mut candidates, self.rng.as_ref());

        if !state.has_history() {
            let empty_vector = PreferenceVector::new();
            let empty_collab = HashMap::new();
            let ctx = ScoringContext {
                preference_vector: &empty_vector,
                liked: &[],
                collaborative: &empty_collab,
            };
            let mut ranked = self.rank(candidates, &ctx);
            shuffle(&mut ranked, self.rng.as_ref());
            debug!(len = ranked.len(), "Queue built without history");
            return Ok(ranked);
        }

        let liked = self.resolve_liked(&state.liked, &catalog).await;
        let recommendations = self.collaborative.recommend(&state.liked, platforms).await;
        let collab_scores = CollaborativeRecommendation::score_map(&recommendations);

        let ctx = ScoringContext {
            preference_vector: &state.preference_vector,
            liked: &liked,
            collaborative: &collab_scores,
        };
        let mut ranked = self.rank(candidates, &ctx);

        let top = ranked.len() / 2;
        shuffle(&mut ranked[..top], self.rng.as_ref());

        debug!(
            len = ranked.len(),
            liked = liked.len(),
            collaborative = recommendations.len(),
            "Queue built"
        );
        Ok(ranked)
    }

    /// Score every candidate and sort descending; ties keep shuffled order
    fn rank(&self, candidates: Vec<Arc<Item>>, ctx: &ScoringContext<'_>) -> Vec<Arc<Item>> {
        let mut scored: Vec<(f64, Arc<Item>)> = candidates
            .into_iter()
            .map(|item| (self.scoring.score(&item, ctx), item))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, item)| item).collect()
    }

    /// Liked items from the current catalog, then from any other cached entry
    async fn resolve_liked(&self, liked_ids: &[String], catalog: &[Arc<Item>]) -> Vec<Arc<Item>> {
        let by_id: HashMap<&str, &Arc<Item>> =
            catalog.iter().map(|item| (item.id.as_str(), item)).collect();

        let mut liked = Vec::with_capacity(liked_ids.len());
        for id in liked_ids {
            match by_id.get(id.as_str()) {
                Some(item) => liked.push(Arc::clone(item)),
                None => {
                    if let Some(item) = self.cache.lookup(id).await {
                        liked.push(item);
                    }
                }
            }
        }
        liked
    }
}
