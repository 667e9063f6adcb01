//! Playdeck recommendation engine
//!
//! Turns accept/skip/reject swipes over a game catalog into an ordered,
//! de-duplicated recommendation queue: preference-vector learning, Jaccard
//! content similarity, collaborative votes from provider suggestions, and a
//! randomized multi-factor score over a TTL catalog cache.

pub mod cache;
pub mod collaborative;
pub mod config;
pub mod content_based;
pub mod error;
pub mod profile;
pub mod provider;
pub mod queue;
pub mod random;
pub mod scoring;
pub mod server;
pub mod service;
pub mod store;
pub mod types;

// Re-export key types
pub use cache::{CacheEntry, CacheStats, CatalogCache};
pub use collaborative::{CollaborativeRecommendation, CollaborativeRecommender};
pub use config::{EngineConfig, ScoringWeights};
pub use error::{EngineError, ProviderError, StoreError};
pub use profile::{RebuildPreferenceVector, UpdatePreferenceVector};
pub use provider::{CatalogProvider, RawgClient};
pub use queue::QueueBuilder;
pub use random::{ConstantRandom, RandomSource, SeededRandom, ThreadRandom};
pub use scoring::{ScoreComponents, ScoringContext, ScoringEngine};
pub use service::QueueService;
pub use store::{KeyValueStore, MemoryStore, RedisStore};
pub use types::*;

#[cfg(test)]
mod tests;
