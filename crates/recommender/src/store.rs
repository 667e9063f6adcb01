//! Persistent key/value store
//!
//! The engine persists cache entries and user state as JSON blobs through
//! [`KeyValueStore`]. Missing or unreadable blobs fall back to empty state.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, StoreError};

/// Blob store used for every persisted structure
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store, used by tests and when no Redis URL is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Connect and verify the connection with a PING
    #[instrument(skip_all)]
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        info!("Initializing Redis store connection");

        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        info!("Redis store initialized successfully");
        Ok(Self {
            manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.prefixed(key)).await?;
        debug!(key = %key, hit = value.is_some(), "Store load");
        Ok(value)
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(self.prefixed(key), blob).await?;
        debug!(key = %key, bytes = blob.len(), "Store save");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(self.prefixed(key)).await?;
        debug!(key = %key, "Store remove");
        Ok(())
    }
}

/// Load and decode a JSON blob.
///
/// Returns `Ok(None)` for a missing key and `CacheCorrupt` for a blob that
/// does not decode.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, EngineError> {
    let Some(blob) = store.load(key).await? else {
        return Ok(None);
    };

    serde_json::from_str(&blob)
        .map(Some)
        .map_err(|e| EngineError::CacheCorrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Load a JSON blob, treating missing, corrupt or unreachable data as empty
pub async fn load_or_default<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> T {
    match load_json(store, key).await {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key = %key, error = %e, "Falling back to empty state");
            T::default()
        }
    }
}

/// Encode and save a JSON blob
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), EngineError> {
    let blob = serde_json::to_string(value).map_err(StoreError::Serialization)?;
    store.save(key, &blob).await?;
    Ok(())
}
