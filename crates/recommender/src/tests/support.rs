//! Shared fixtures for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ProviderError;
use crate::provider::CatalogProvider;
use crate::types::{Item, ItemDetail, Platform, PlatformSet, RatingClass};

pub fn item(id: &str, genres: &[&str]) -> Item {
    Item {
        id: id.to_string(),
        title: format!("Game {}", id),
        release_year: Some(2005),
        platform: Platform::PlayStation2,
        developer: None,
        description: None,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        tags: Vec::new(),
        rating: None,
        metacritic: None,
        rating_class: RatingClass::F,
        images: Vec::new(),
    }
}

pub fn numbered_items(prefix: &str, count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| item(&format!("{}{}", prefix, i), &["action"]))
        .collect()
}

pub fn ps2() -> PlatformSet {
    PlatformSet::new([Platform::PlayStation2]).unwrap()
}

/// In-process provider with scripted responses and call counters
#[derive(Default)]
pub struct ScriptedProvider {
    pages: Mutex<HashMap<u32, Vec<Item>>>,
    page_failure: Mutex<Option<ProviderError>>,
    suggestions: Mutex<HashMap<String, Result<Vec<Item>, ProviderError>>>,
    details: Mutex<HashMap<String, ItemDetail>>,
    delay: Option<Duration>,
    page_calls: AtomicUsize,
    suggestion_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_page(self, page: u32, items: Vec<Item>) -> Self {
        self.pages.lock().unwrap().insert(page, items);
        self
    }

    pub fn with_suggestions(self, id: &str, items: Vec<Item>) -> Self {
        self.suggestions
            .lock()
            .unwrap()
            .insert(id.to_string(), Ok(items));
        self
    }

    pub fn with_failing_suggestions(self, id: &str) -> Self {
        self.suggestions.lock().unwrap().insert(
            id.to_string(),
            Err(ProviderError::Request("connection reset".to_string())),
        );
        self
    }

    pub fn with_details(self, id: &str, detail: ItemDetail) -> Self {
        self.details.lock().unwrap().insert(id.to_string(), detail);
        self
    }

    pub fn fail_pages_with(&self, error: Option<ProviderError>) {
        *self.page_failure.lock().unwrap() = error;
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn suggestion_calls(&self) -> usize {
        self.suggestion_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for ScriptedProvider {
    async fn fetch_page(
        &self,
        _platforms: &PlatformSet,
        page: u32,
    ) -> Result<Vec<Item>, ProviderError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.page_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_suggestions(&self, item_id: &str) -> Result<Vec<Item>, ProviderError> {
        self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
        self.suggestions
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_details(&self, item_id: &str) -> Result<ItemDetail, ProviderError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| ProviderError::Request(format!("no details for {}", item_id)))
    }
}
