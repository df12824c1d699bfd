//! Cart mutation pipeline (application-level orchestration).
//!
//! This module implements the **read-modify-write pattern** for the cart
//! aggregate under optimistic concurrency. It orchestrates the full
//! lifecycle: loading the cart, resolving catalog state, applying the
//! operation, committing through the version compare-and-swap, retrying
//! losers, and publishing the change notification.
//!
//! ## Mutation Flow
//!
//! Every mutating operation runs this pipeline:
//!
//! ```text
//! Operation
//!   ↓
//! 1. Load (or lazily create) the user's cart
//!   ↓
//! 2. Resolve product records from the catalog (price, stock, active)
//!   ↓
//! 3. Apply the operation to the in-memory aggregate (pure, validated)
//!   ↓
//! 4. Save with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish a CartChangedEvent (post-commit, fire-and-forget)
//! ```
//!
//! When step 4 loses the version race (`Conflict`, or a bounded read
//! `Timeout`), the pipeline backs off and re-runs from step 1: the loser
//! re-reads current state and re-applies its logic rather than overwriting
//! blindly. Two concurrent "add one" calls therefore both land. The retry
//! budget is bounded; exhaustion surfaces as `Concurrency`, distinct from
//! user errors.
//!
//! ## Why This Orchestration?
//!
//! - **Encapsulate the retry discipline**: the load/apply/CAS/retry cycle is
//!   identical across operations, so it lives here once instead of in every
//!   handler
//! - **Keep the domain pure**: the aggregate validates and mutates in memory;
//!   all IO (store, catalog, bus, cache) stays behind injected traits
//! - **Compose infrastructure**: generic over `CartStore`, `CatalogReader`,
//!   `EventBus` and `SnapshotCache`, so the in-memory and persistent stacks
//!   share one code path
//!
//! ## Error Semantics
//!
//! - **Validation failures** (`InvalidQuantity`, `OutOfStock`, `NotFound`,
//!   `Validation`) are deterministic and never retried
//! - **Version races** (`Conflict`/`Timeout` from the store) are retried up
//!   to the budget, then surface as `Concurrency`
//! - **Publish failures** are logged at `warn` and never fail the mutation:
//!   the commit already happened and the snapshot cache TTL covers a missed
//!   invalidation

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use storefront_cart::{
    Cart, CartChangedEvent, CartEventKind, CartSnapshot, GuestLine, MergeLineOutcome, MergeSummary,
};
use storefront_catalog::ProductRecord;
use storefront_core::{
    AggregateRoot, CartItemId, DomainError, ExpectedVersion, ProductId, UserId,
};
use storefront_events::EventBus;

use crate::cart_store::{CartStore, CartStoreError};
use crate::catalog::{CatalogError, CatalogReader};
use crate::read_model::SnapshotCache;

/// Bounded retry discipline for optimistic-concurrency losers.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first try included.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

/// Cart service operation error, the taxonomy handlers map to HTTP.
#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    OutOfStock { requested: u32, available: u32 },

    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Lost the version race and the retry budget is spent. Retryable by the
    /// caller; the cart is unchanged beyond its last committed state.
    #[error("concurrent cart modification: {0}")]
    Concurrency(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<DomainError> for CartServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => CartServiceError::Validation(msg),
            DomainError::InvalidQuantity(msg) => CartServiceError::InvalidQuantity(msg),
            DomainError::OutOfStock {
                requested,
                available,
            } => CartServiceError::OutOfStock {
                requested,
                available,
            },
            DomainError::InvalidId(msg) => CartServiceError::Validation(msg),
            DomainError::NotFound => CartServiceError::NotFound,
            DomainError::Conflict(msg) => CartServiceError::Concurrency(msg),
        }
    }
}

impl From<CartStoreError> for CartServiceError {
    fn from(value: CartStoreError) -> Self {
        match value {
            CartStoreError::Conflict(msg) => CartServiceError::Concurrency(msg),
            CartStoreError::Timeout(msg) => CartServiceError::Concurrency(msg),
            CartStoreError::Storage(msg) => CartServiceError::Storage(msg),
            CartStoreError::Serialize(msg) => CartServiceError::Storage(msg),
        }
    }
}

impl From<CatalogError> for CartServiceError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Storage(msg) => CartServiceError::Storage(msg),
        }
    }
}

/// Per-attempt failure classification for the retry loop.
enum AttemptError {
    /// Lost the version race (or a bounded read deadline); worth re-reading
    /// and re-applying.
    Retryable(CartStoreError),
    /// Deterministic or terminal; retrying cannot change the outcome.
    Fatal(CartServiceError),
}

impl From<CartStoreError> for AttemptError {
    fn from(value: CartStoreError) -> Self {
        match value {
            CartStoreError::Conflict(_) | CartStoreError::Timeout(_) => {
                AttemptError::Retryable(value)
            }
            other => AttemptError::Fatal(other.into()),
        }
    }
}

impl From<DomainError> for AttemptError {
    fn from(value: DomainError) -> Self {
        AttemptError::Fatal(value.into())
    }
}

impl From<CatalogError> for AttemptError {
    fn from(value: CatalogError) -> Self {
        AttemptError::Fatal(value.into())
    }
}

/// Application service for the cart surface.
///
/// `CartService` sits between the HTTP handlers and the infrastructure layer
/// (cart store, catalog, event bus, snapshot cache). It provides a
/// **consistent execution model** for all cart operations while keeping the
/// aggregate pure and the stores swappable.
///
/// ## Execution Guarantees
///
/// - **No lost updates**: every commit is a version CAS; losers re-read and
///   re-apply under a bounded retry budget
/// - **Commit before publish**: the change notification goes out only after
///   the store accepted the write, and its failure never rolls anything back
/// - **Failed mutations change nothing**: validation happens on the in-memory
///   aggregate before the save; a failed attempt leaves the persisted cart at
///   its last committed state
///
/// ## Generic Parameters
///
/// - `S`: cart persistence (`InMemoryCartStore` in tests/dev,
///   `PostgresCartStore` in production)
/// - `C`: catalog reads (`InMemoryCatalog` / `PostgresCatalog`)
/// - `B`: change notification fan-out (`InMemoryEventBus` /
///   `RedisPubSubEventBus`)
/// - `K`: snapshot cache (`InMemorySnapshotCache` / `RedisSnapshotCache`)
#[derive(Debug)]
pub struct CartService<S, C, B, K> {
    store: S,
    catalog: C,
    bus: B,
    cache: K,
    retry: RetryPolicy,
}

impl<S, C, B, K> CartService<S, C, B, K> {
    pub fn new(store: S, catalog: C, bus: B, cache: K) -> Self {
        Self {
            store,
            catalog,
            bus,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl<S, C, B, K> CartService<S, C, B, K>
where
    S: CartStore,
    C: CatalogReader,
    B: EventBus<CartChangedEvent> + Clone + Send + 'static,
    K: SnapshotCache,
{
    /// Add `quantity` units of a product, merging into an existing line.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id, quantity), err)]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, CartServiceError> {
        self.with_retries("add_item", || {
            self.try_add_item(user_id, product_id, quantity)
        })
        .await
    }

    /// Set a line to an absolute quantity; zero removes it (idempotently).
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id, quantity), err)]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartSnapshot, CartServiceError> {
        self.with_retries("update_item_quantity", || {
            self.try_update_item_quantity(user_id, item_id, quantity)
        })
        .await
    }

    /// Remove a line. Removing an absent line (or from an absent cart) is a
    /// success without a commit or an event.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id), err)]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<CartSnapshot, CartServiceError> {
        self.with_retries("remove_item", || self.try_remove_item(user_id, item_id))
            .await
    }

    /// Remove every line. Clearing an empty or absent cart is a success
    /// without a commit or an event.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<CartSnapshot, CartServiceError> {
        self.with_retries("clear_cart", || self.try_clear_cart(user_id))
            .await
    }

    /// Current cart as the caller sees it, read-through against the snapshot
    /// cache.
    ///
    /// A cache miss loads the cart, prunes lines whose product vanished from
    /// the catalog (committed, so the pruning cannot resurrect), projects
    /// live stock flags, and repopulates the cache. A user without a cart
    /// gets an empty snapshot and nothing is persisted.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn get_current_cart(
        &self,
        user_id: UserId,
    ) -> Result<CartSnapshot, CartServiceError> {
        if let Some(snapshot) = self.cache.get(user_id) {
            return Ok(snapshot);
        }

        let snapshot = self
            .with_retries("get_current_cart", || self.try_get_current_cart(user_id))
            .await?;

        self.cache.put(user_id, snapshot.clone());
        Ok(snapshot)
    }

    /// Merge a guest cart into the user's cart as one read-modify-write unit.
    ///
    /// Per guest line: add semantics, but the resulting quantity is capped at
    /// the per-line maximum instead of failing, and lines that cannot land
    /// (zero quantity, unknown/inactive product, insufficient stock) are
    /// skipped, never an error.
    #[instrument(skip(self, guest_lines), fields(user_id = %user_id, lines = guest_lines.len()), err)]
    pub async fn merge_guest_cart(
        &self,
        user_id: UserId,
        guest_lines: &[GuestLine],
    ) -> Result<(MergeSummary, CartSnapshot), CartServiceError> {
        self.with_retries("merge_guest_cart", || {
            self.try_merge_guest_cart(user_id, guest_lines)
        })
        .await
    }

    /// Drive one operation attempt function through the retry budget.
    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_fn: F,
    ) -> Result<T, CartServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempt = 1u32;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Retryable(err)) => {
                    if attempt >= self.retry.max_attempts.max(1) {
                        warn!(operation, attempts = attempt, error = %err, "retry budget exhausted");
                        return Err(err.into());
                    }
                    debug!(operation, attempt, error = %err, "lost the version race, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }
    }

    async fn try_add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, AttemptError> {
        let product = self.resolve_purchasable(product_id).await?;

        let mut cart = self.store.load_or_create(user_id).await?;
        let loaded = cart.version();

        let item_id = cart.add_item(&product, quantity)?;
        let line_quantity = cart
            .find_item(item_id)
            .map(|line| line.quantity())
            .unwrap_or(quantity);

        self.store
            .save(&mut cart, ExpectedVersion::Exact(loaded))
            .await?;

        self.publish_event(CartChangedEvent::record(
            &cart,
            CartEventKind::ItemAdded,
            Some(product_id),
            Some(line_quantity),
        ));

        self.project(&cart).await
    }

    async fn try_update_item_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartSnapshot, AttemptError> {
        if quantity == 0 {
            // Zero means delete, with removal's idempotency.
            return self.try_remove_item(user_id, item_id).await;
        }

        let Some(mut cart) = self.store.load(user_id).await? else {
            return Err(AttemptError::Fatal(CartServiceError::NotFound));
        };
        let loaded = cart.version();

        let Some(line) = cart.find_item(item_id) else {
            return Err(AttemptError::Fatal(CartServiceError::NotFound));
        };
        let product_id = line.product_id();
        let product = self.resolve_purchasable(product_id).await?;

        cart.set_item_quantity(item_id, quantity, &product)?;

        self.store
            .save(&mut cart, ExpectedVersion::Exact(loaded))
            .await?;

        self.publish_event(CartChangedEvent::record(
            &cart,
            CartEventKind::ItemUpdated,
            Some(product_id),
            Some(quantity),
        ));

        self.project(&cart).await
    }

    async fn try_remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<CartSnapshot, AttemptError> {
        let Some(mut cart) = self.store.load(user_id).await? else {
            return Ok(CartSnapshot::empty());
        };
        let loaded = cart.version();

        let Some(removed) = cart.remove_item(item_id) else {
            // Already gone: no commit, no event.
            return self.project(&cart).await;
        };

        self.store
            .save(&mut cart, ExpectedVersion::Exact(loaded))
            .await?;

        self.publish_event(CartChangedEvent::record(
            &cart,
            CartEventKind::ItemRemoved,
            Some(removed.product_id()),
            None,
        ));

        self.project(&cart).await
    }

    async fn try_clear_cart(&self, user_id: UserId) -> Result<CartSnapshot, AttemptError> {
        let Some(mut cart) = self.store.load(user_id).await? else {
            return Ok(CartSnapshot::empty());
        };
        let loaded = cart.version();

        if cart.clear() == 0 {
            // Already empty: no commit, no event.
            return self.project(&cart).await;
        }

        self.store
            .save(&mut cart, ExpectedVersion::Exact(loaded))
            .await?;

        self.publish_event(CartChangedEvent::record(
            &cart,
            CartEventKind::Cleared,
            None,
            None,
        ));

        self.project(&cart).await
    }

    async fn try_get_current_cart(&self, user_id: UserId) -> Result<CartSnapshot, AttemptError> {
        let Some(mut cart) = self.store.load(user_id).await? else {
            return Ok(CartSnapshot::empty());
        };
        let loaded = cart.version();

        let ids: Vec<ProductId> = cart.items().iter().map(|line| line.product_id()).collect();
        let products = self.catalog.products(&ids).await?;

        // Lazy cleanup: lines whose product vanished from the catalog are
        // dropped, and the drop is committed so it cannot resurrect.
        let existing: HashSet<ProductId> = products.keys().copied().collect();
        let removed = cart.remove_missing_products(&existing);
        if !removed.is_empty() {
            self.store
                .save(&mut cart, ExpectedVersion::Exact(loaded))
                .await?;

            self.publish_event(CartChangedEvent::record(
                &cart,
                CartEventKind::ItemRemoved,
                None,
                None,
            ));
        }

        Ok(CartSnapshot::project(&cart, &products))
    }

    async fn try_merge_guest_cart(
        &self,
        user_id: UserId,
        guest_lines: &[GuestLine],
    ) -> Result<(MergeSummary, CartSnapshot), AttemptError> {
        let mut cart = self.store.load_or_create(user_id).await?;
        let loaded = cart.version();

        // One catalog round-trip covers both the merge and the projection.
        let mut ids: Vec<ProductId> = cart.items().iter().map(|line| line.product_id()).collect();
        ids.extend(guest_lines.iter().map(|line| line.product_id));
        let products = self.catalog.products(&ids).await?;

        let before = cart.clone();
        let mut summary = MergeSummary::default();

        for line in guest_lines {
            let outcome = match products.get(&line.product_id) {
                Some(product) if product.is_purchasable() => {
                    cart.merge_item(product, line.quantity)
                }
                _ => MergeLineOutcome::Skipped,
            };
            summary.record(outcome);
        }

        // All lines skipped (or capped into no-ops) means nothing to commit.
        if cart != before {
            self.store
                .save(&mut cart, ExpectedVersion::Exact(loaded))
                .await?;

            self.publish_event(CartChangedEvent::record(
                &cart,
                CartEventKind::Merged,
                None,
                None,
            ));
        }

        let snapshot = CartSnapshot::project(&cart, &products);
        Ok((summary, snapshot))
    }

    /// Resolve a product for a mutating operation.
    ///
    /// Unknown and inactive products are the same `NotFound` to callers.
    async fn resolve_purchasable(
        &self,
        product_id: ProductId,
    ) -> Result<ProductRecord, AttemptError> {
        match self.catalog.product(product_id).await? {
            Some(record) if record.is_purchasable() => Ok(record),
            _ => Err(AttemptError::Fatal(CartServiceError::NotFound)),
        }
    }

    /// Project the response snapshot with live stock flags.
    async fn project(&self, cart: &Cart) -> Result<CartSnapshot, AttemptError> {
        let ids: Vec<ProductId> = cart.items().iter().map(|line| line.product_id()).collect();
        let products = self.catalog.products(&ids).await?;
        Ok(CartSnapshot::project(cart, &products))
    }

    /// Publish post-commit, off the request task.
    ///
    /// The bus may do blocking IO (Redis), and a failed publish must never
    /// fail the mutation: the commit already happened and the cache TTL
    /// covers a missed invalidation.
    fn publish_event(&self, event: CartChangedEvent) {
        let bus = self.bus.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = bus.publish(event) {
                warn!(error = ?err, "cart event publication failed");
            }
        });
    }
}
