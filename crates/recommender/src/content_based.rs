//! Content Similarity
//!
//! Jaccard index over the union of an item's genres and tags.

use std::collections::HashSet;
use std::sync::Arc;

use crate::types::Item;

/// Jaccard similarity of two feature sets; 0 when both are empty
pub fn jaccard_similarity(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Symmetric similarity in `[0, 1]` between two items
pub fn similarity(a: &Item, b: &Item) -> f64 {
    jaccard_similarity(&a.feature_set(), &b.feature_set())
}

/// Highest similarity between `item` and any liked item (0 if none liked)
pub fn max_similarity(item: &Item, liked: &[Arc<Item>]) -> f64 {
    if liked.is_empty() {
        return 0.0;
    }
    let features = item.feature_set();
    liked
        .iter()
        .map(|other| jaccard_similarity(&features, &other.feature_set()))
        .fold(0.0, f64::max)
}
