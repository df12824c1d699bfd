//! Read-side access to the product catalog.
//!
//! Cart operations never own product data; they resolve prices, stock and
//! availability through this boundary at the moment of each mutation. The
//! catalog itself (creation, pricing, archival) is maintained elsewhere.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use storefront_catalog::ProductRecord;
use storefront_core::ProductId;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCatalog;
pub use postgres::PostgresCatalog;

/// Catalog lookup error.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog lookup failed: {0}")]
    Storage(String),
}

/// Read-only product lookups, keyed by product id.
///
/// `products()` returns every id that resolves, active or not; absence from
/// the result map means the product is gone from the catalog entirely.
/// Purchasability filtering is the caller's concern, so that cart cleanup can
/// distinguish deleted products (lines dropped) from deactivated ones (lines
/// kept, flagged through stock state).
#[async_trait::async_trait]
pub trait CatalogReader: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError>;

    async fn products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductRecord>, CatalogError>;
}

#[async_trait::async_trait]
impl<C> CatalogReader for Arc<C>
where
    C: CatalogReader + ?Sized,
{
    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        (**self).product(id).await
    }

    async fn products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductRecord>, CatalogError> {
        (**self).products(ids).await
    }
}
