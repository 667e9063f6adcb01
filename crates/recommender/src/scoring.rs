//! Scoring Engine
//!
//! Linear blend of preference affinity, content similarity, collaborative
//! votes, era/hidden-gem bonuses and two random exploration terms. The only
//! impurity is the injected [`RandomSource`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ScoringWeights;
use crate::content_based::max_similarity;
use crate::random::RandomSource;
use crate::types::{Item, PreferenceVector};

const HIDDEN_GEM_TAIL_BONUS: f64 = 0.3;
const HIDDEN_GEM_LOW_BONUS: f64 = 0.15;
const ERA_BONUS: f64 = 0.2;

/// Inputs shared by every item scored in one queue build
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub preference_vector: &'a PreferenceVector,
    pub liked: &'a [Arc<Item>],
    pub collaborative: &'a HashMap<String, f64>,
}

/// Unweighted signal values for one item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreComponents {
    pub affinity: f64,
    pub developer: f64,
    pub platform: f64,
    pub content_similarity: f64,
    pub collaborative: f64,
    pub hidden_gem: f64,
    pub era: f64,
    pub exploration: f64,
    pub chaos: f64,
}

impl ScoreComponents {
    /// Weighted sum, clamped at zero
    pub fn combine(&self, weights: &ScoringWeights) -> f64 {
        let total = weights.content_similarity * self.content_similarity
            + weights.affinity * self.affinity
            + weights.collaborative * self.collaborative
            + weights.developer * self.developer
            + weights.platform * self.platform
            + weights.era * self.era
            + weights.hidden_gem * self.hidden_gem
            + weights.chaos * self.chaos
            + weights.exploration * self.exploration;

        if total.is_finite() {
            total.max(0.0)
        } else {
            0.0
        }
    }
}

/// Bonus for items rated in the tails of the distribution
pub fn hidden_gem_bonus(rating: Option<f32>) -> f64 {
    let Some(r) = rating.map(f64::from) else {
        return 0.0;
    };
    if r >= 4.5 || (r > 0.0 && r < 2.0) {
        HIDDEN_GEM_TAIL_BONUS
    } else if (2.0..3.0).contains(&r) {
        HIDDEN_GEM_LOW_BONUS
    } else {
        0.0
    }
}

/// Bonus for items released during their platform's active years
pub fn era_bonus(item: &Item) -> f64 {
    let Some(year) = item.release_year else {
        return 0.0;
    };
    let (start, end) = item.platform.active_years();
    if (start..=end).contains(&year) {
        ERA_BONUS
    } else {
        0.0
    }
}

/// Sum of preference weights over the item's genres and tags
pub fn affinity(item: &Item, vector: &PreferenceVector) -> f64 {
    item.feature_keys().map(|key| vector.weight(key)).sum()
}

pub struct ScoringEngine {
    weights: ScoringWeights,
    rng: Arc<dyn RandomSource>,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights, rng: Arc<dyn RandomSource>) -> Self {
        Self { weights, rng }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Compute every signal for `item`. Draws two values from the random source.
    pub fn components(&self, item: &Item, ctx: &ScoringContext<'_>) -> ScoreComponents {
        let vector = ctx.preference_vector;

        let developer = item
            .developer
            .as_deref()
            .map(|d| vector.weight(&PreferenceVector::developer_key(d)))
            .unwrap_or(0.0);

        ScoreComponents {
            affinity: affinity(item, vector),
            developer,
            platform: vector.weight(&PreferenceVector::platform_key(item.platform)),
            content_similarity: max_similarity(item, ctx.liked),
            collaborative: ctx.collaborative.get(&item.id).copied().unwrap_or(0.0),
            hidden_gem: hidden_gem_bonus(item.rating),
            era: era_bonus(item),
            exploration: self.rng.next_f64() * self.weights.exploration_scale,
            chaos: self.rng.next_f64() * self.weights.chaos_scale,
        }
    }

    /// Final non-negative score for `item`
    pub fn score(&self, item: &Item, ctx: &ScoringContext<'_>) -> f64 {
        self.components(item, ctx).combine(&self.weights)
    }
}
