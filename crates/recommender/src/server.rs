//! HTTP routes over [`QueueService`]

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::EngineError;
use crate::service::QueueService;
use crate::types::{Action, PlatformSet};

pub struct AppState {
    pub service: Arc<QueueService>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    /// Comma-separated platform names; the configured defaults when absent
    pub platforms: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpandRequest {
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub consumed: usize,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub item_id: String,
    pub action: Action,
}

fn platforms_from_query(raw: Option<&str>, service: &QueueService) -> Result<PlatformSet, EngineError> {
    let names: Vec<&str> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    if names.is_empty() {
        return Ok(service.default_platforms().clone());
    }
    PlatformSet::parse(&names)
}

async fn health_check(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "playdeck-recommender",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": data.service.cache_stats()
    }))
}

async fn get_queue(
    data: web::Data<AppState>,
    query: web::Query<QueueQuery>,
) -> Result<HttpResponse, EngineError> {
    let platforms = platforms_from_query(query.platforms.as_deref(), &data.service)?;
    let items = data.service.get_queue(&platforms).await?;

    Ok(HttpResponse::Ok().json(json!({
        "platforms": platforms.cache_key(),
        "count": items.len(),
        "items": items
    })))
}

async fn expand_queue(
    data: web::Data<AppState>,
    payload: web::Json<ExpandRequest>,
) -> Result<HttpResponse, EngineError> {
    let request = payload.into_inner();
    let platforms = if request.platforms.is_empty() {
        data.service.default_platforms().clone()
    } else {
        PlatformSet::parse(&request.platforms)?
    };
    let items = data.service.expand_queue(&platforms, request.consumed).await?;

    Ok(HttpResponse::Ok().json(json!({
        "platforms": platforms.cache_key(),
        "count": items.len(),
        "items": items
    })))
}

async fn record_interaction(
    data: web::Data<AppState>,
    payload: web::Json<InteractionRequest>,
) -> Result<HttpResponse, EngineError> {
    let request = payload.into_inner();
    data.service
        .record_interaction(&request.item_id, request.action)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn reset_user_data(data: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    data.service.reset_user_data().await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn get_item(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let item_id = path.into_inner();
    match data.service.get_item_by_id(&item_id).await {
        Some(item) => HttpResponse::Ok().json(item),
        None => HttpResponse::NotFound().json(json!({
            "error": "Item not found",
            "id": item_id
        })),
    }
}

async fn get_item_details(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let item_id = path.into_inner();
    match data.service.item_details(&item_id).await {
        Some(item) => HttpResponse::Ok().json(item),
        None => HttpResponse::NotFound().json(json!({
            "error": "Item not found",
            "id": item_id
        })),
    }
}

async fn get_wishlist(data: web::Data<AppState>) -> impl Responder {
    let items = data.service.wishlist().await;
    HttpResponse::Ok().json(json!({
        "count": items.len(),
        "items": items
    }))
}

async fn remove_from_wishlist(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    data.service.remove_from_wishlist(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/queue", web::get().to(get_queue))
        .route("/queue/expand", web::post().to(expand_queue))
        .route("/interactions", web::post().to(record_interaction))
        .route("/user-data", web::delete().to(reset_user_data))
        .route("/items/{id}", web::get().to(get_item))
        .route("/items/{id}/details", web::get().to(get_item_details))
        .route("/wishlist", web::get().to(get_wishlist))
        .route("/wishlist/{id}", web::delete().to(remove_from_wishlist));
}
