//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use playdeck_recommender::{
    CatalogProvider, ConstantRandom, EngineConfig, Item, ItemDetail, MemoryStore, Platform,
    PlatformSet, ProviderError, QueueService, RandomSource, RatingClass,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn game(id: &str, genres: &[&str]) -> Item {
    Item {
        id: id.to_string(),
        title: format!("Game {}", id),
        release_year: Some(2004),
        platform: Platform::PlayStation2,
        developer: Some("Studio".to_string()),
        description: None,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        tags: Vec::new(),
        rating: Some(3.2),
        metacritic: None,
        rating_class: RatingClass::B,
        images: Vec::new(),
    }
}

pub fn games(prefix: &str, count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| game(&format!("{}{}", prefix, i), &["action"]))
        .collect()
}

pub fn ps2() -> PlatformSet {
    PlatformSet::new([Platform::PlayStation2]).unwrap()
}

/// Catalog provider serving fixed pages and counting every call
#[derive(Default)]
pub struct FakeCatalog {
    pages: Mutex<HashMap<u32, Vec<Item>>>,
    suggestions: Mutex<HashMap<String, Vec<Item>>>,
    details: Mutex<HashMap<String, ItemDetail>>,
    failure: Mutex<Option<ProviderError>>,
    delay: Mutex<Option<Duration>>,
    page_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, page: u32, items: Vec<Item>) -> Self {
        self.pages.lock().unwrap().insert(page, items);
        self
    }

    pub fn suggestions(self, id: &str, items: Vec<Item>) -> Self {
        self.suggestions.lock().unwrap().insert(id.to_string(), items);
        self
    }

    pub fn details(self, id: &str, detail: ItemDetail) -> Self {
        self.details.lock().unwrap().insert(id.to_string(), detail);
        self
    }

    pub fn delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn fail_with(&self, error: ProviderError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn fetch_page(&self, _platforms: &PlatformSet, page: u32) -> Result<Vec<Item>, ProviderError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.pages.lock().unwrap().get(&page).cloned().unwrap_or_default())
    }

    async fn fetch_suggestions(&self, item_id: &str) -> Result<Vec<Item>, ProviderError> {
        Ok(self
            .suggestions
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_details(&self, item_id: &str) -> Result<ItemDetail, ProviderError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| ProviderError::Request(format!("HTTP 404 for {}", item_id)))
    }
}

/// Config with small page counts so scripted pages cover the whole fetch
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.catalog.initial_pages = 2;
    config.catalog.expansion_pages = 2;
    config.default_platforms.0 = vec!["PlayStation 2".to_string()];
    config
}

pub fn service_with(
    config: &EngineConfig,
    catalog: Arc<FakeCatalog>,
    store: Arc<MemoryStore>,
    rng: Arc<dyn RandomSource>,
) -> QueueService {
    QueueService::new(config, catalog, store, rng).unwrap()
}

pub fn service(catalog: Arc<FakeCatalog>) -> QueueService {
    service_with(
        &test_config(),
        catalog,
        Arc::new(MemoryStore::new()),
        Arc::new(ConstantRandom(0.0)),
    )
}
