//! RAWG video game database client
//!
//! Rate limit: enforced server-side, surfaced as `ProviderError::RateLimited`
//! Cache: 30 minutes per request

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::CatalogProvider;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{Item, ItemDetail, Platform, PlatformSet, RatingClass};

const MAX_TAGS: usize = 8;

const MISSING_KEY_HELP: &str = "RAWG API key missing. Set PLAYDECK_PROVIDER__API_KEY (or RAWG_API_KEY) in your environment or .env file. Get a free key from https://rawg.io/apidocs";

/// RAWG API client
pub struct RawgClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    page_size: u32,
    suggestion_page_size: u32,
    cache: Cache<String, Value>,
}

impl RawgClient {
    /// Create a new RAWG client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(config.response_cache_capacity)
            .time_to_live(Duration::from_secs(config.response_cache_ttl_sec))
            .build();

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            suggestion_page_size: config.suggestion_page_size,
            cache,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Number of memoized responses
    pub async fn cached_responses(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable(MISSING_KEY_HELP.to_string()))
    }

    /// GET `path` with query parameters, memoizing successful responses
    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
        cache_key: String,
    ) -> Result<Value, ProviderError> {
        let api_key = self.api_key()?;

        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!(cache_key = %cache_key, "Using cached RAWG response");
            return Ok(cached);
        }

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("key", api_key)])
            .query(params)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::Unavailable(
                    "Invalid RAWG API key. Check PLAYDECK_PROVIDER__API_KEY (or RAWG_API_KEY)"
                        .to_string(),
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited(
                    "RAWG API rate limit exceeded. Wait a moment and try again".to_string(),
                ));
            }
            status if !status.is_success() => {
                return Err(ProviderError::Request(format!(
                    "RAWG returned HTTP {} for {}",
                    status, path
                )));
            }
            _ => {}
        }

        let data: Value = response.json().await?;
        self.cache.insert(cache_key, data.clone()).await;
        Ok(data)
    }

    fn parse_results(
        data: Value,
        requested: Option<&PlatformSet>,
    ) -> Result<Vec<Item>, ProviderError> {
        let page: RawgPage = serde_json::from_value(data)
            .map_err(|e| ProviderError::Request(format!("Malformed RAWG response: {}", e)))?;

        Ok(page
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|game| game.into_item(requested))
            .collect())
    }
}

#[async_trait]
impl CatalogProvider for RawgClient {
    #[instrument(skip(self, platforms), fields(platforms = %platforms))]
    async fn fetch_page(
        &self,
        platforms: &PlatformSet,
        page: u32,
    ) -> Result<Vec<Item>, ProviderError> {
        let ids = platforms
            .iter()
            .map(|p| p.rawg_id().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let params = [
            ("platforms", ids.clone()),
            ("ordering", "random".to_string()),
            ("page", page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        let cache_key = format!("games:{}:{}:{}", ids, page, self.page_size);

        let data = self.get_json("/games", &params, cache_key).await?;
        let items = Self::parse_results(data, Some(platforms))?;
        debug!(page, count = items.len(), "Fetched RAWG page");
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn fetch_suggestions(&self, item_id: &str) -> Result<Vec<Item>, ProviderError> {
        let params = [("page_size", self.suggestion_page_size.to_string())];
        let cache_key = format!("suggested:{}", item_id);
        let path = format!("/games/{}/suggested", item_id);

        let data = self.get_json(&path, &params, cache_key).await?;
        let items = Self::parse_results(data, None)?;
        debug!(count = items.len(), "Fetched RAWG suggestions");
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn fetch_details(&self, item_id: &str) -> Result<ItemDetail, ProviderError> {
        let cache_key = format!("details:{}", item_id);
        let path = format!("/games/{}", item_id);

        let data = self.get_json(&path, &[], cache_key).await?;
        let game: RawgGame = serde_json::from_value(data)
            .map_err(|e| ProviderError::Request(format!("Malformed RAWG details: {}", e)))?;

        Ok(ItemDetail {
            description: game.description_text(),
            developer: game.first_developer(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawgPage {
    results: Option<Vec<RawgGame>>,
}

#[derive(Debug, Deserialize)]
struct RawgNamed {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawgPlatformEntry {
    platform: RawgNamed,
}

#[derive(Debug, Deserialize)]
struct RawgScreenshot {
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawgGame {
    id: u64,
    #[serde(default)]
    name: String,
    released: Option<String>,
    platforms: Option<Vec<RawgPlatformEntry>>,
    developers: Option<Vec<RawgNamed>>,
    description_raw: Option<String>,
    description: Option<String>,
    genres: Option<Vec<RawgNamed>>,
    tags: Option<Vec<RawgNamed>>,
    rating: Option<f32>,
    metacritic: Option<u32>,
    background_image: Option<String>,
    short_screenshots: Option<Vec<RawgScreenshot>>,
}

impl RawgGame {
    fn description_text(&self) -> Option<String> {
        self.description_raw
            .as_ref()
            .or(self.description.as_ref())
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    }

    fn first_developer(&self) -> Option<String> {
        self.developers
            .as_ref()
            .and_then(|devs| devs.first())
            .map(|d| d.name.clone())
            .filter(|n| !n.is_empty())
    }

    fn release_year(&self) -> Option<i32> {
        self.released
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }

    /// Resolve the display platform.
    ///
    /// Prefers the first supported platform inside the requested set, then
    /// any supported platform, then the first requested one.
    fn resolve_platform(&self, requested: Option<&PlatformSet>) -> Option<Platform> {
        let supported: Vec<Platform> = self
            .platforms
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                Platform::from_rawg_id(entry.platform.id)
                    .or_else(|| entry.platform.name.parse().ok())
            })
            .collect();

        match requested {
            Some(set) => supported
                .iter()
                .copied()
                .find(|p| set.contains(*p))
                .or_else(|| supported.first().copied())
                .or(Some(set.first())),
            None => supported.first().copied(),
        }
    }

    fn into_item(self, requested: Option<&PlatformSet>) -> Option<Item> {
        let Some(platform) = self.resolve_platform(requested) else {
            warn!(id = self.id, "Dropping RAWG record with no supported platform");
            return None;
        };

        let names = |list: Option<Vec<RawgNamed>>| -> Vec<String> {
            list.unwrap_or_default()
                .into_iter()
                .map(|n| n.name)
                .filter(|n| !n.is_empty())
                .collect()
        };

        let description = self.description_text();
        let developer = self.first_developer();
        let release_year = self.release_year();

        let images: Vec<String> = self
            .background_image
            .into_iter()
            .chain(
                self.short_screenshots
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|s| s.image),
            )
            .filter(|url| !url.is_empty())
            .collect();

        let mut tags = names(self.tags);
        tags.truncate(MAX_TAGS);

        Some(Item {
            id: self.id.to_string(),
            title: self.name,
            release_year,
            platform,
            developer,
            description,
            genres: names(self.genres),
            tags,
            rating: self.rating,
            metacritic: self.metacritic,
            rating_class: RatingClass::derive(self.metacritic, self.rating),
            images,
        })
    }
}
