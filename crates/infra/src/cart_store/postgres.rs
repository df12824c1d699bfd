//! Postgres-backed cart store implementation.
//!
//! This module persists carts in two tables: a `carts` row per user carrying
//! the version column, and a `cart_items` row per line. A save is one
//! transaction: compare-and-swap the version, replace the line rows, commit.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `CartStoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | CartStoreError | Scenario |
//! |------------|----------------------|----------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Two writers raced on the same cart (user_id or item uniqueness) |
//! | Database (foreign key violation) | `23503` | `Storage` | Line insert against a vanished cart row |
//! | Database (check constraint violation) | `23514` | `Storage` | Invalid data (e.g., quantity <= 0) |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! Reads additionally run under a bounded deadline; exceeding it surfaces as
//! `Timeout`, which callers treat exactly like a version conflict (back off,
//! reload, retry).
//!
//! ## Thread Safety
//!
//! `PostgresCartStore` is `Send + Sync` and can be shared across tasks.
//! All operations use the SQLx connection pool which handles thread-safe
//! connection management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, Span};

use storefront_cart::{Cart, CartItem};
use storefront_core::{CartId, CartItemId, ExpectedVersion, ProductId, UserId};

use super::r#trait::{CartStore, CartStoreError};

/// Deadline applied to cart reads so a blocked row lock cannot stall callers.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Postgres-backed cart store.
///
/// ## Optimistic Concurrency
///
/// The `save()` method runs one transaction that:
/// 1. Updates the cart row with `SET version = version + 1` guarded by
///    `WHERE version = expected`
/// 2. Treats zero updated rows as a lost race (`Conflict`)
/// 3. Replaces the cart's line rows
///
/// The version guard and the bump are a single statement, so two concurrent
/// savers against the same version can never both succeed.
#[derive(Debug, Clone)]
pub struct PostgresCartStore {
    pool: Arc<PgPool>,
    read_timeout: Duration,
}

impl PostgresCartStore {
    /// Create a new PostgresCartStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Create the cart tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), CartStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS carts (
                id         UUID PRIMARY KEY,
                user_id    UUID NOT NULL UNIQUE,
                version    BIGINT NOT NULL DEFAULT 1 CHECK (version >= 1),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cart_items (
                id         UUID PRIMARY KEY,
                cart_id    UUID NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
                product_id UUID NOT NULL,
                quantity   INT NOT NULL CHECK (quantity >= 1),
                unit_price BIGINT NOT NULL CHECK (unit_price >= 0),
                UNIQUE (cart_id, product_id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }

    /// Run a read under the configured deadline.
    async fn bounded_read<T, F>(&self, operation: &str, fut: F) -> Result<T, CartStoreError>
    where
        F: Future<Output = Result<T, CartStoreError>>,
    {
        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CartStoreError::Timeout(format!(
                "{operation} exceeded {:?}",
                self.read_timeout
            ))),
        }
    }

    async fn fetch_cart(&self, user_id: UserId) -> Result<Option<Cart>, CartStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, version
            FROM carts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_cart", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cart_row = CartRow::from_row(&row)
            .map_err(|e| CartStoreError::Serialize(format!("failed to decode cart row: {e}")))?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, unit_price
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(cart_row.id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_cart_items", e))?;

        let mut items = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            let item = CartItemRow::from_row(&row)
                .map_err(|e| CartStoreError::Serialize(format!("failed to decode item row: {e}")))?;
            items.push(item.into());
        }

        Ok(Some(Cart::rehydrate(
            CartId::from_uuid(cart_row.id),
            UserId::from_uuid(cart_row.user_id),
            items,
            cart_row.version as u64,
        )))
    }
}

#[async_trait::async_trait]
impl CartStore for PostgresCartStore {
    #[instrument(skip(self), fields(user_id = %user_id.as_uuid()), err)]
    async fn load(&self, user_id: UserId) -> Result<Option<Cart>, CartStoreError> {
        self.bounded_read("load", self.fetch_cart(user_id)).await
    }

    #[instrument(skip(self), fields(user_id = %user_id.as_uuid()), err)]
    async fn load_or_create(&self, user_id: UserId) -> Result<Cart, CartStoreError> {
        let fresh_id = CartId::new();

        // Racing creators converge on one row; the loser's insert is a no-op.
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(*fresh_id.as_uuid())
        .bind(*user_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_cart", e))?;

        let cart = self.bounded_read("load_or_create", self.fetch_cart(user_id)).await?;
        cart.ok_or_else(|| {
            CartStoreError::Storage(format!("cart row for user {user_id} vanished after insert"))
        })
    }

    #[instrument(
        skip(self, cart),
        fields(
            cart_id = %cart.id_typed().as_uuid(),
            user_id = %cart.user_id().as_uuid(),
            item_count = cart.items().len(),
            expected = ?expected
        ),
        err
    )]
    async fn save(
        &self,
        cart: &mut Cart,
        expected: ExpectedVersion,
    ) -> Result<u64, CartStoreError> {
        let span = Span::current();
        span.record("operation", "save");

        let cart_id = *cart.id_typed().as_uuid();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // CAS: guard and bump in one statement so racing savers cannot both win.
        let updated = match expected {
            ExpectedVersion::Exact(version) => sqlx::query(
                r#"
                UPDATE carts
                SET version = version + 1, updated_at = NOW()
                WHERE id = $1 AND version = $2
                RETURNING version
                "#,
            )
            .bind(cart_id)
            .bind(version as i64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("bump_version", e))?,
            ExpectedVersion::Any => sqlx::query(
                r#"
                UPDATE carts
                SET version = version + 1, updated_at = NOW()
                WHERE id = $1
                RETURNING version
                "#,
            )
            .bind(cart_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("bump_version", e))?,
        };

        let Some(row) = updated else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(CartStoreError::Conflict(format!(
                "cart {} not at expected {:?}",
                cart.id_typed(),
                expected
            )));
        };

        let new_version: i64 = row
            .try_get("version")
            .map_err(|e| CartStoreError::Serialize(format!("failed to read version: {e}")))?;

        // Replace the line collection wholesale; the version bump above already
        // fenced out concurrent writers.
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;

        for item in cart.items() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(*item.id_typed().as_uuid())
            .bind(cart_id)
            .bind(*item.product_id().as_uuid())
            .bind(item.quantity() as i32)
            .bind(item.unit_price() as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        cart.set_version(new_version as u64);
        span.record("new_version", new_version);
        Ok(new_version as u64)
    }
}

/// Map SQLx errors to CartStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CartStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            if let Some(code) = db_err.code() {
                match code.as_ref() {
                    "23505" => {
                        // Unique violation: a concurrent writer got there first
                        CartStoreError::Conflict(msg)
                    }
                    "23503" => {
                        // Foreign key violation (cart row vanished under us)
                        CartStoreError::Storage(msg)
                    }
                    "23514" => {
                        // Check constraint violation
                        CartStoreError::Storage(msg)
                    }
                    _ => CartStoreError::Storage(msg),
                }
            } else {
                CartStoreError::Storage(msg)
            }
        }
        sqlx::Error::PoolClosed => {
            CartStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => CartStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct CartRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CartRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CartRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            version: row.try_get("version")?,
        })
    }
}

#[derive(Debug)]
struct CartItemRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i32,
    unit_price: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CartItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CartItemRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        })
    }
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        CartItem::rehydrate(
            CartItemId::from_uuid(row.id),
            ProductId::from_uuid(row.product_id),
            row.quantity as u32,
            row.unit_price as u64,
        )
    }
}
