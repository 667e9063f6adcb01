//! Catalog Cache
//!
//! Deduplicated items per platform-set key with a TTL, stale fallback on
//! provider failure, and single-flight incremental expansion. Entries are
//! persisted under `catalog:<key>` with an index of known keys.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::CatalogConfig;
use crate::error::{EngineError, ProviderError, Result};
use crate::provider::CatalogProvider;
use crate::store::{self, KeyValueStore};
use crate::types::{Item, ItemDetail, PlatformSet};

const ENTRY_PREFIX: &str = "catalog:";
const INDEX_KEY: &str = "catalog_index";

/// Cached catalog for one platform-set key. Items are unique by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub items: Vec<Arc<Item>>,
    pub fetched_at: DateTime<Utc>,
    /// First page not yet requested from the provider
    pub next_page: u32,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        // negative age (clock skew) counts as fresh
        age.to_std().map(|age| age < ttl).unwrap_or(true)
    }

    pub fn find(&self, item_id: &str) -> Option<&Arc<Item>> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Append items whose id is not present yet; returns how many were added
    fn merge(&mut self, incoming: Vec<Item>) -> usize {
        let mut ids: HashSet<String> = self.items.iter().map(|i| i.id.clone()).collect();
        let before = self.items.len();
        for item in incoming {
            if ids.insert(item.id.clone()) {
                self.items.push(Arc::new(item));
            }
        }
        self.items.len() - before
    }
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub items: usize,
    pub expansions_in_flight: usize,
}

/// Removes the in-flight marker when the expansion finishes or is dropped
struct ExpansionGuard<'a> {
    in_flight: &'a DashSet<String>,
    key: String,
}

impl Drop for ExpansionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

pub struct CatalogCache {
    provider: Arc<dyn CatalogProvider>,
    store: Arc<dyn KeyValueStore>,
    config: CatalogConfig,
    entries: DashMap<String, CacheEntry>,
    expanding: DashSet<String>,
    /// Serializes read-modify-write of the persisted key index
    index_lock: Mutex<()>,
}

impl CatalogCache {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        store: Arc<dyn KeyValueStore>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            entries: DashMap::new(),
            expanding: DashSet::new(),
            index_lock: Mutex::new(()),
        }
    }

    /// Items for `platforms`, refreshing from the provider when the entry is
    /// missing, expired or `force_refresh` is set.
    ///
    /// A failed refresh falls back to the existing entry, however old. Only
    /// when nothing is cached does the failure reach the caller.
    #[instrument(skip(self, platforms), fields(key = %platforms))]
    pub async fn fetch(&self, platforms: &PlatformSet, force_refresh: bool) -> Result<Vec<Arc<Item>>> {
        let key = platforms.cache_key();
        let existing = self.entry(&key).await;

        if let Some(entry) = &existing {
            if !force_refresh && entry.is_fresh(self.config.ttl()) {
                debug!(items = entry.items.len(), "Using cached catalog");
                return Ok(entry.items.clone());
            }
        }

        let pages = 1..self.config.initial_pages + 1;
        let outcome = match self.fetch_pages(platforms, pages).await {
            Ok(fetched) if fetched.is_empty() => Err(EngineError::EmptyCatalog { key: key.clone() }),
            Ok(fetched) => Ok(fetched),
            Err(source) => Err(EngineError::CatalogUnavailable {
                key: key.clone(),
                source,
            }),
        };

        let fetched = match outcome {
            Ok(fetched) => fetched,
            Err(e) => {
                return match existing {
                    Some(stale) => {
                        warn!(error = %e, items = stale.items.len(), "Catalog refresh failed, serving stale entry");
                        Ok(stale.items)
                    }
                    None => Err(e),
                };
            }
        };

        let mut entry = CacheEntry {
            key: key.clone(),
            items: Vec::with_capacity(fetched.len()),
            fetched_at: Utc::now(),
            next_page: self.config.initial_pages + 1,
        };
        entry.merge(fetched);

        info!(items = entry.items.len(), "Catalog cached");
        let items = entry.items.clone();
        self.put(entry).await;
        Ok(items)
    }

    /// Grow the entry for `platforms` with the next batch of pages.
    ///
    /// No-op while more than `expand_threshold` items remain unconsumed, or
    /// while another expansion for the same key is running. Expansion
    /// failures are logged and the current items returned.
    ///
    /// With nothing cached yet the first caller performs the initial fetch;
    /// concurrent callers get an empty list instead of fetching again.
    #[instrument(skip(self, platforms), fields(key = %platforms))]
    pub async fn expand(&self, platforms: &PlatformSet, consumed: usize) -> Result<Vec<Arc<Item>>> {
        let key = platforms.cache_key();

        let Some(current) = self.entry(&key).await else {
            let Some(_guard) = self.begin_expansion(&key) else {
                debug!("Initial fetch already in flight");
                return Ok(self.snapshot(platforms).unwrap_or_default());
            };
            return self.fetch(platforms, false).await;
        };

        let remaining = current.items.len().saturating_sub(consumed);
        if remaining > self.config.expand_threshold {
            debug!(remaining, "Enough items remaining, skipping expansion");
            return Ok(current.items);
        }

        let Some(_guard) = self.begin_expansion(&key) else {
            debug!("Expansion already in flight");
            return Ok(current.items);
        };

        let start = current.next_page;
        let pages = start..start + self.config.expansion_pages;
        let fetched = match self.fetch_pages(platforms, pages).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "Catalog expansion failed, keeping current items");
                return Ok(current.items);
            }
        };

        let expanded = {
            let mut entry = self.entries.entry(key.clone()).or_insert(current);
            let added = entry.merge(fetched);
            entry.next_page = entry.next_page.max(start + self.config.expansion_pages);
            info!(added, total = entry.items.len(), "Catalog expanded");
            entry.clone()
        };

        let items = expanded.items.clone();
        self.persist(&expanded).await;
        Ok(items)
    }

    /// Find an item in any cached entry
    pub async fn lookup(&self, item_id: &str) -> Option<Arc<Item>> {
        if let Some(found) = self.lookup_loaded(item_id) {
            return Some(found);
        }

        for key in self.persisted_keys().await {
            if !self.entries.contains_key(&key) {
                self.entry(&key).await;
            }
        }
        self.lookup_loaded(item_id)
    }

    fn lookup_loaded(&self, item_id: &str) -> Option<Arc<Item>> {
        self.entries
            .iter()
            .find_map(|entry| entry.find(item_id).cloned())
    }

    /// Patch every cached copy of `item_id` in place and persist the
    /// affected entries. Returns the upgraded item, if cached.
    pub async fn apply_detail(&self, item_id: &str, detail: &ItemDetail) -> Option<Arc<Item>> {
        let mut updated = None;
        let mut touched = Vec::new();

        for mut entry in self.entries.iter_mut() {
            let mut changed = false;
            for item in entry.items.iter_mut().filter(|i| i.id == item_id) {
                Arc::make_mut(item).apply_detail(detail.clone());
                updated = Some(Arc::clone(item));
                changed = true;
            }
            if changed {
                touched.push(entry.clone());
            }
        }

        for entry in &touched {
            self.persist(entry).await;
        }
        updated
    }

    /// Drop every entry from memory and the store
    pub async fn clear(&self) {
        let _index = self.index_lock.lock().await;
        let mut keys: HashSet<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.extend(self.persisted_keys().await);
        self.entries.clear();

        for key in keys {
            if let Err(e) = self.store.remove(&entry_key(&key)).await {
                warn!(key = %key, error = %e, "Failed to remove persisted catalog");
            }
        }
        if let Err(e) = self.store.remove(INDEX_KEY).await {
            warn!(error = %e, "Failed to remove catalog index");
        }
        info!("Catalog cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            items: self.entries.iter().map(|e| e.items.len()).sum(),
            expansions_in_flight: self.expanding.len(),
        }
    }

    /// Items currently held in memory for `platforms`, without any I/O
    pub fn snapshot(&self, platforms: &PlatformSet) -> Option<Vec<Arc<Item>>> {
        self.entries
            .get(&platforms.cache_key())
            .map(|entry| entry.items.clone())
    }

    fn begin_expansion(&self, key: &str) -> Option<ExpansionGuard<'_>> {
        if !self.expanding.insert(key.to_string()) {
            return None;
        }
        Some(ExpansionGuard {
            in_flight: &self.expanding,
            key: key.to_string(),
        })
    }

    /// Issue every page request at once; pages are concatenated in request
    /// order and the first failure in that order wins.
    async fn fetch_pages(
        &self,
        platforms: &PlatformSet,
        pages: Range<u32>,
    ) -> std::result::Result<Vec<Item>, ProviderError> {
        debug!(first = pages.start, last = pages.end.saturating_sub(1), "Fetching catalog pages");
        let requests = pages.map(|page| self.provider.fetch_page(platforms, page));
        let results = join_all(requests).await;

        let mut items = Vec::new();
        for result in results {
            items.extend(result?);
        }
        Ok(items)
    }

    /// Entry for `key` from memory, falling back to the store
    async fn entry(&self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.entries.get(key) {
            return Some(entry.clone());
        }

        match store::load_json::<CacheEntry>(self.store.as_ref(), &entry_key(key)).await {
            Ok(Some(entry)) => {
                debug!(key = %key, items = entry.items.len(), "Restored persisted catalog");
                let entry = self
                    .entries
                    .entry(key.to_string())
                    .or_insert(entry)
                    .clone();
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable persisted catalog");
                None
            }
        }
    }

    async fn put(&self, entry: CacheEntry) {
        self.persist(&entry).await;

        {
            let _index = self.index_lock.lock().await;
            let mut keys = self.persisted_keys().await;
            if !keys.contains(&entry.key) {
                keys.push(entry.key.clone());
                if let Err(e) = store::save_json(self.store.as_ref(), INDEX_KEY, &keys).await {
                    warn!(error = %e, "Failed to persist catalog index");
                }
            }
        }

        self.entries.insert(entry.key.clone(), entry);
    }

    async fn persist(&self, entry: &CacheEntry) {
        if let Err(e) = store::save_json(self.store.as_ref(), &entry_key(&entry.key), entry).await {
            warn!(key = %entry.key, error = %e, "Failed to persist catalog");
        }
    }

    async fn persisted_keys(&self) -> Vec<String> {
        store::load_or_default(self.store.as_ref(), INDEX_KEY).await
    }
}

fn entry_key(key: &str) -> String {
    format!("{}{}", ENTRY_PREFIX, key)
}
