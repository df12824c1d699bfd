//! Postgres-backed catalog reads.
//!
//! The `products` table is owned by the catalog service; this side only ever
//! reads it. Row shape mirrors [`ProductRecord`].

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use storefront_catalog::ProductRecord;
use storefront_core::ProductId;

use super::{CatalogError, CatalogReader};

#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the products table if it does not exist yet (dev setups where
    /// no catalog service has run migrations).
    pub async fn ensure_schema(&self) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id             UUID PRIMARY KEY,
                price          BIGINT NOT NULL CHECK (price >= 0),
                stock_quantity INT NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
                active         BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| CatalogError::Storage(format!("ensure_schema: {e}")))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogReader for PostgresCatalog {
    #[instrument(skip(self), fields(product_id = %id.as_uuid()), err)]
    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>, CatalogError> {
        let row = sqlx::query(
            r#"
            SELECT id, price, stock_quantity, active
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CatalogError::Storage(format!("product: {e}")))?;

        row.map(|row| {
            ProductRow::from_row(&row)
                .map(ProductRecord::from)
                .map_err(|e| CatalogError::Storage(format!("failed to decode product row: {e}")))
        })
        .transpose()
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn products(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductRecord>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, price, stock_quantity, active
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(&uuids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| CatalogError::Storage(format!("products: {e}")))?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let record: ProductRecord = ProductRow::from_row(&row)
                .map_err(|e| CatalogError::Storage(format!("failed to decode product row: {e}")))?
                .into();
            found.insert(record.id, record);
        }

        Ok(found)
    }
}

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    price: i64,
    stock_quantity: i32,
    active: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            price: row.try_get("price")?,
            stock_quantity: row.try_get("stock_quantity")?,
            active: row.try_get("active")?,
        })
    }
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        ProductRecord {
            id: ProductId::from_uuid(row.id),
            price: row.price as u64,
            stock_quantity: row.stock_quantity as u32,
            active: row.active,
        }
    }
}
