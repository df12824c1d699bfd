use std::sync::Arc;

use thiserror::Error;

use storefront_cart::Cart;
use storefront_core::{ExpectedVersion, UserId};

/// Cart store operation error.
///
/// This enum represents errors that can occur when interacting with the cart
/// store. These are **infrastructure errors** (storage, concurrency, timeouts)
/// as opposed to domain errors (validation, quantity limits).
///
/// ## Error Categories
///
/// - **Conflict**: Optimistic concurrency check failed (version mismatch)
/// - **Timeout**: The backend did not answer within the configured deadline
/// - **Storage**: The backend rejected or lost the operation
/// - **Serialize**: Cart state could not be encoded for storage
#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("storage operation timed out: {0}")]
    Timeout(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("cart serialization failed: {0}")]
    Serialize(String),
}

/// Versioned, user-scoped cart persistence.
///
/// The `CartStore` is the **persistence layer** for carts. Each user has at
/// most one active cart; the user id is the lookup key and the cart's version
/// column is the unit of optimistic concurrency.
///
/// ## Design Principles
///
/// - **No storage assumptions**: Works with in-memory implementations
///   (tests/dev) and SQL backends (production)
/// - **One cart per user**: `load`/`load_or_create` resolve by user id only
/// - **Optimistic locking**: Via `ExpectedVersion` (no row locks held across
///   user think-time)
/// - **Whole-cart writes**: A save replaces the line collection atomically
///   alongside the version bump
///
/// ## Save Semantics
///
/// `save()`:
/// - Checks the stored version against `expected`; a mismatch returns
///   `Conflict` and leaves storage untouched
/// - On match, persists the cart's lines and bumps the version by exactly one
/// - Writes the new version back into the passed cart and returns it
///
/// ## Load Semantics
///
/// `load()` returns `None` when the user has never persisted a cart.
/// `load_or_create()` persists an empty cart at version 1 in that case, so
/// the returned cart always has a row to CAS against.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - Enforce the version check and the bump atomically (no lost updates
///   between check and write)
/// - Never report success without the version having advanced
/// - Map backend-level uniqueness violations on the user id to `Conflict`
///   (two racing `load_or_create` calls must converge on one row)
#[async_trait::async_trait]
pub trait CartStore: Send + Sync {
    /// Load the active cart for a user, if one has been persisted.
    async fn load(&self, user_id: UserId) -> Result<Option<Cart>, CartStoreError>;

    /// Load the active cart for a user, first persisting an empty cart at
    /// version 1 if the user has none.
    async fn load_or_create(&self, user_id: UserId) -> Result<Cart, CartStoreError>;

    /// Persist the cart if the stored version still matches `expected`.
    ///
    /// On success the store bumps the version by one, writes it back into
    /// `cart`, and returns it.
    async fn save(
        &self,
        cart: &mut Cart,
        expected: ExpectedVersion,
    ) -> Result<u64, CartStoreError>;
}

#[async_trait::async_trait]
impl<S> CartStore for Arc<S>
where
    S: CartStore + ?Sized,
{
    async fn load(&self, user_id: UserId) -> Result<Option<Cart>, CartStoreError> {
        (**self).load(user_id).await
    }

    async fn load_or_create(&self, user_id: UserId) -> Result<Cart, CartStoreError> {
        (**self).load_or_create(user_id).await
    }

    async fn save(
        &self,
        cart: &mut Cart,
        expected: ExpectedVersion,
    ) -> Result<u64, CartStoreError> {
        (**self).save(cart, expected).await
    }
}
