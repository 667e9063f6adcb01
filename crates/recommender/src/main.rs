//! Playdeck recommender service
//!
//! Port: 8084 (PLAYDECK_SERVER__PORT)
//! Store: Redis when PLAYDECK_STORE__REDIS_URL is set, in-memory otherwise

use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use playdeck_recommender::server::{configure_routes, AppState};
use playdeck_recommender::{
    EngineConfig, KeyValueStore, MemoryStore, QueueService, RawgClient, RedisStore, ThreadRandom,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = EngineConfig::load()?;

    let provider = RawgClient::new(&config.provider)?;
    if !provider.has_api_key() {
        warn!("No RAWG API key configured, catalog fetches will fail until one is set");
    }

    let store: Arc<dyn KeyValueStore> = match config.store.redis_url.as_deref() {
        Some(url) => Arc::new(RedisStore::connect(url, config.store.key_prefix.clone()).await?),
        None => {
            info!("No Redis URL configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let service = QueueService::new(&config, Arc::new(provider), store, Arc::new(ThreadRandom))?;
    let state = web::Data::new(AppState {
        service: Arc::new(service),
    });

    let bind = (config.server.host.clone(), config.server.port);
    info!(host = %bind.0, port = bind.1, "Starting Playdeck recommender");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
