//! Catalog provider capability
//!
//! The engine only depends on [`CatalogProvider`]; the RAWG adapter in
//! [`rawg`] is the production implementation.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Item, ItemDetail, PlatformSet};

pub mod rawg;

pub use rawg::RawgClient;

/// Remote source of item records
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch one page (1-based) of items for the given platforms
    async fn fetch_page(&self, platforms: &PlatformSet, page: u32)
        -> Result<Vec<Item>, ProviderError>;

    /// Items the provider suggests as similar to `item_id`.
    ///
    /// `Ok(vec![])` means the provider has no suggestions; `Err` means the
    /// call itself failed.
    async fn fetch_suggestions(&self, item_id: &str) -> Result<Vec<Item>, ProviderError>;

    /// Long-form fields for a single item
    async fn fetch_details(&self, item_id: &str) -> Result<ItemDetail, ProviderError>;
}
