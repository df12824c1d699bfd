use std::collections::HashMap;
use std::sync::RwLock;

use storefront_catalog::ProductRecord;
use storefront_core::ProductId;

use super::{CatalogError, CatalogReader};

/// In-memory catalog.
///
/// Intended for tests/dev; seeded through `upsert`/`remove`.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: ProductRecord) {
        if let Ok(mut products) = self.products.write() {
            products.insert(record.id, record);
        }
    }

    pub fn remove(&self, id: ProductId) -> Option<ProductRecord> {
        self.products.write().ok()?.remove(&id)
    }
}

#[async_trait::async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))?;

        Ok(products.get(&id).cloned())
    }

    async fn products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductRecord>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Storage("lock poisoned".to_string()))?;

        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}
