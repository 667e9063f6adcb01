use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;
use crate::types::PlatformSet;

/// Recommender service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Catalog provider (RAWG) configuration
    pub provider: ProviderConfig,

    /// Catalog cache configuration
    pub catalog: CatalogConfig,

    /// Collaborative recommender configuration
    pub collaborative: CollaborativeConfig,

    /// Scoring weights
    pub scoring: ScoringWeights,

    /// Persistent store configuration
    pub store: StoreConfig,

    /// Platforms used when a request names none
    pub default_platforms: DefaultPlatforms,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (default: 8084)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8084,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL
    pub base_url: String,

    /// API key
    pub api_key: Option<String>,

    /// Items per catalog page
    pub page_size: u32,

    /// Suggestions requested per item
    pub suggestion_page_size: u32,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Response cache TTL (seconds)
    pub response_cache_ttl_sec: u64,

    /// Response cache capacity (entries)
    pub response_cache_capacity: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.rawg.io/api".to_string(),
            api_key: None,
            page_size: 40,
            suggestion_page_size: 20,
            timeout_ms: 10_000,
            response_cache_ttl_sec: 1800, // 30 minutes
            response_cache_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Entry time-to-live (seconds)
    pub ttl_sec: u64,

    /// Pages requested on a full fetch
    pub initial_pages: u32,

    /// Pages requested per expansion
    pub expansion_pages: u32,

    /// Expansion is skipped while more than this many items remain unconsumed
    pub expand_threshold: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl_sec: 86_400, // 24 hours
            initial_pages: 8,
            expansion_pages: 4,
            expand_threshold: 20,
        }
    }
}

impl CatalogConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_sec)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    pub max_recommendations: usize,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            max_recommendations: 20,
        }
    }
}

/// Linear combination weights for the scoring terms.
///
/// These are empirical tuning constants.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub content_similarity: f64,
    pub affinity: f64,
    pub collaborative: f64,
    pub developer: f64,
    pub platform: f64,
    pub era: f64,
    pub hidden_gem: f64,
    pub chaos: f64,
    pub exploration: f64,

    /// Upper bound of the exploration noise draw
    pub exploration_scale: f64,

    /// Upper bound of the chaos draw
    pub chaos_scale: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            content_similarity: 0.40,
            affinity: 0.25,
            collaborative: 0.15,
            developer: 0.08,
            platform: 0.05,
            era: 0.03,
            hidden_gem: 0.02,
            chaos: 0.01,
            exploration: 1.0,
            exploration_scale: 0.3,
            chaos_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis connection URL; an in-memory store is used when absent
    pub redis_url: Option<String>,

    /// Prefix applied to every persisted key
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "playdeck:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DefaultPlatforms(pub Vec<String>);

impl Default for DefaultPlatforms {
    fn default() -> Self {
        Self(vec!["PlayStation 2".to_string(), "PlayStation 3".to_string()])
    }
}

impl EngineConfig {
    /// Load configuration from `.env`, an optional config file and environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/playdeck").required(false))
            .add_source(
                config::Environment::with_prefix("PLAYDECK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut loaded: Self = settings.try_deserialize()?;

        if loaded.provider.api_key.is_none() {
            loaded.provider.api_key = std::env::var("RAWG_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.catalog.initial_pages == 0 {
            return Err(EngineError::Configuration(
                "catalog.initial_pages must be greater than 0".to_string(),
            ));
        }
        if self.catalog.expansion_pages == 0 {
            return Err(EngineError::Configuration(
                "catalog.expansion_pages must be greater than 0".to_string(),
            ));
        }
        if self.provider.page_size == 0 {
            return Err(EngineError::Configuration(
                "provider.page_size must be greater than 0".to_string(),
            ));
        }
        self.default_platform_set()?;
        Ok(())
    }

    pub fn default_platform_set(&self) -> Result<PlatformSet, EngineError> {
        PlatformSet::parse(&self.default_platforms.0)
    }
}
