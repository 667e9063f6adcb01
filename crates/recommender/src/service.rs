//! Queue service
//!
//! Consumer-facing operations over the engine: queue builds, interaction
//! recording, wishlist management and user-data reset. User state is loaded
//! from the store on first use and written back after every change.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, instrument, warn};

use crate::cache::{CacheStats, CatalogCache};
use crate::collaborative::CollaborativeRecommender;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::profile::{RebuildPreferenceVector, UpdatePreferenceVector};
use crate::provider::CatalogProvider;
use crate::queue::QueueBuilder;
use crate::random::RandomSource;
use crate::scoring::ScoringEngine;
use crate::store::{self, KeyValueStore};
use crate::types::{Action, Interaction, Item, PlatformSet, PreferenceVector, UserState};

pub const PREFERENCE_VECTOR_KEY: &str = "preference_vector";
pub const SEEN_KEY: &str = "seen_item_ids";
pub const REJECTED_KEY: &str = "rejected_item_ids";
pub const LIKED_KEY: &str = "liked_items";
pub const WISHLIST_KEY: &str = "wishlist";
pub const INTERACTIONS_KEY: &str = "interactions";

const USER_KEYS: [&str; 6] = [
    PREFERENCE_VECTOR_KEY,
    SEEN_KEY,
    REJECTED_KEY,
    LIKED_KEY,
    WISHLIST_KEY,
    INTERACTIONS_KEY,
];

pub struct QueueService {
    cache: Arc<CatalogCache>,
    queue: QueueBuilder,
    provider: Arc<dyn CatalogProvider>,
    store: Arc<dyn KeyValueStore>,
    default_platforms: PlatformSet,
    state: OnceCell<Mutex<UserState>>,
}

impl QueueService {
    pub fn new(
        config: &EngineConfig,
        provider: Arc<dyn CatalogProvider>,
        store: Arc<dyn KeyValueStore>,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let default_platforms = config.default_platform_set()?;

        let cache = Arc::new(CatalogCache::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            config.catalog.clone(),
        ));
        let collaborative = Arc::new(CollaborativeRecommender::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            config.collaborative.max_recommendations,
        ));
        let scoring = ScoringEngine::new(config.scoring.clone(), Arc::clone(&rng));
        let queue = QueueBuilder::new(Arc::clone(&cache), collaborative, scoring, rng);

        Ok(Self {
            cache,
            queue,
            provider,
            store,
            default_platforms,
            state: OnceCell::new(),
        })
    }

    pub fn default_platforms(&self) -> &PlatformSet {
        &self.default_platforms
    }

    /// Ordered recommendation queue for `platforms`
    pub async fn get_queue(&self, platforms: &PlatformSet) -> Result<Vec<Arc<Item>>> {
        let snapshot = self.user_state().await;
        self.queue.build(platforms, &snapshot).await
    }

    /// Grow the catalog for `platforms` and return the unseen items
    pub async fn expand_queue(&self, platforms: &PlatformSet, consumed: usize) -> Result<Vec<Arc<Item>>> {
        let items = self.cache.expand(platforms, consumed).await?;
        let state = self.state().await.lock().await;
        Ok(items
            .into_iter()
            .filter(|item| !state.is_excluded(&item.id))
            .collect())
    }

    /// Record a swipe and update preference state.
    ///
    /// The interaction is logged and the item marked seen even when the item
    /// cannot be resolved; only the preference update is skipped then.
    #[instrument(skip(self))]
    pub async fn record_interaction(&self, item_id: &str, action: Action) -> Result<()> {
        // resolved before locking; a cache miss may hit the provider
        let resolved = self.get_item_by_id(item_id).await;
        let mut state = self.state().await.lock().await;

        state.interactions.push(Interaction::new(item_id, action));
        state.seen.insert(item_id.to_string());

        let Some(item) = resolved else {
            warn!(item_id = %item_id, "Interaction recorded for unknown item");
            self.persist(&state).await;
            return Ok(());
        };

        state.preference_vector =
            UpdatePreferenceVector::execute(action, &item, &state.preference_vector);

        match action {
            Action::Accepted => {
                push_unique(&mut state.wishlist, item_id);
                push_unique(&mut state.liked, item_id);
            }
            Action::Rejected => {
                state.rejected.insert(item_id.to_string());
            }
            Action::Skipped | Action::Unknown => {}
        }

        self.persist(&state).await;
        Ok(())
    }

    /// Clear every piece of user state, in memory and persisted
    pub async fn reset_user_data(&self) -> Result<()> {
        let mut state = self.state().await.lock().await;
        *state = UserState::default();

        for key in USER_KEYS {
            self.store.remove(key).await?;
        }
        info!("User data reset");
        Ok(())
    }

    /// Look an item up in any cached catalog, fetching the default platforms
    /// on a miss. Provider failures yield `None`.
    pub async fn get_item_by_id(&self, item_id: &str) -> Option<Arc<Item>> {
        if let Some(item) = self.cache.lookup(item_id).await {
            return Some(item);
        }

        match self.cache.fetch(&self.default_platforms, false).await {
            Ok(items) => items.into_iter().find(|item| item.id == item_id),
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Item lookup failed");
                None
            }
        }
    }

    /// Item with its long-form description, fetched on demand
    #[instrument(skip(self))]
    pub async fn item_details(&self, item_id: &str) -> Option<Arc<Item>> {
        let item = self.get_item_by_id(item_id).await?;
        if item.has_description() {
            return Some(item);
        }

        match self.provider.fetch_details(item_id).await {
            Ok(detail) => match self.cache.apply_detail(item_id, &detail).await {
                Some(updated) => Some(updated),
                None => {
                    let mut upgraded = (*item).clone();
                    upgraded.apply_detail(detail);
                    Some(Arc::new(upgraded))
                }
            },
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Detail fetch failed, returning summary");
                Some(item)
            }
        }
    }

    pub async fn wishlist(&self) -> Vec<String> {
        self.state().await.lock().await.wishlist.clone()
    }

    pub async fn is_in_wishlist(&self, item_id: &str) -> bool {
        self.state()
            .await
            .lock()
            .await
            .wishlist
            .iter()
            .any(|id| id == item_id)
    }

    /// Remove from both the wishlist and the liked list
    pub async fn remove_from_wishlist(&self, item_id: &str) -> Result<()> {
        let mut state = self.state().await.lock().await;
        state.wishlist.retain(|id| id != item_id);
        state.liked.retain(|id| id != item_id);
        self.persist(&state).await;
        Ok(())
    }

    /// Recompute the preference vector from the interaction log
    pub async fn rebuild_preferences(&self) -> Result<PreferenceVector> {
        let mut state = self.state().await.lock().await;

        let mut items: HashMap<String, Arc<Item>> = HashMap::new();
        for interaction in &state.interactions {
            if items.contains_key(&interaction.item_id) {
                continue;
            }
            if let Some(item) = self.cache.lookup(&interaction.item_id).await {
                items.insert(interaction.item_id.clone(), item);
            }
        }

        let rebuilt = RebuildPreferenceVector::execute(&state.interactions, |id| {
            items.get(id).map(|item| item.as_ref())
        });
        state.preference_vector = rebuilt.clone();
        self.persist(&state).await;
        Ok(rebuilt)
    }

    /// Copy of the current user state
    pub async fn user_state(&self) -> UserState {
        self.state().await.lock().await.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    async fn state(&self) -> &Mutex<UserState> {
        self.state
            .get_or_init(|| async { Mutex::new(self.load_state().await) })
            .await
    }

    async fn load_state(&self) -> UserState {
        let store = self.store.as_ref();
        UserState {
            preference_vector: store::load_or_default(store, PREFERENCE_VECTOR_KEY).await,
            seen: store::load_or_default(store, SEEN_KEY).await,
            rejected: store::load_or_default(store, REJECTED_KEY).await,
            liked: store::load_or_default(store, LIKED_KEY).await,
            wishlist: store::load_or_default(store, WISHLIST_KEY).await,
            interactions: store::load_or_default(store, INTERACTIONS_KEY).await,
        }
    }

    async fn persist(&self, state: &UserState) {
        if let Err(e) = self.write_state(state).await {
            warn!(error = %e, "Failed to persist user state");
        }
    }

    async fn write_state(&self, state: &UserState) -> Result<()> {
        let store = self.store.as_ref();
        store::save_json(store, PREFERENCE_VECTOR_KEY, &state.preference_vector).await?;
        store::save_json(store, SEEN_KEY, &state.seen).await?;
        store::save_json(store, REJECTED_KEY, &state.rejected).await?;
        store::save_json(store, LIKED_KEY, &state.liked).await?;
        store::save_json(store, WISHLIST_KEY, &state.wishlist).await?;
        store::save_json(store, INTERACTIONS_KEY, &state.interactions).await?;
        Ok(())
    }
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}
