//! Integration tests for the full cart pipeline.
//!
//! Tests: Service → CartStore (version CAS) → EventBus → CacheInvalidator → SnapshotCache
//!
//! Verifies:
//! - Concurrent writers never lose updates (losers re-read and re-apply)
//! - The retry budget is honored and exhaustion surfaces as `Concurrency`
//! - Lazy cleanup of vanished products is committed, not just projected
//! - Events published after commits carry post-commit totals and drive
//!   cache invalidation

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use storefront_cart::{Cart, CartChangedEvent, CartEventKind, GuestLine};
    use storefront_catalog::ProductRecord;
    use storefront_core::{AggregateRoot, CartItemId, ExpectedVersion, ProductId, UserId};
    use storefront_events::{EventBus, InMemoryEventBus};

    use crate::cart_service::{CartService, CartServiceError, RetryPolicy};
    use crate::cart_store::{CartStore, CartStoreError, InMemoryCartStore};
    use crate::catalog::InMemoryCatalog;
    use crate::read_model::{InMemorySnapshotCache, SnapshotCache};
    use crate::workers::CacheInvalidator;

    type TestService = CartService<
        Arc<InMemoryCartStore>,
        Arc<InMemoryCatalog>,
        Arc<InMemoryEventBus<CartChangedEvent>>,
        Arc<InMemorySnapshotCache>,
    >;

    struct TestStack {
        service: Arc<TestService>,
        store: Arc<InMemoryCartStore>,
        catalog: Arc<InMemoryCatalog>,
        bus: Arc<InMemoryEventBus<CartChangedEvent>>,
        cache: Arc<InMemorySnapshotCache>,
    }

    fn setup() -> TestStack {
        let store = Arc::new(InMemoryCartStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let cache = Arc::new(InMemorySnapshotCache::new());

        let service = Arc::new(CartService::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&bus),
            Arc::clone(&cache),
        ));

        TestStack {
            service,
            store,
            catalog,
            bus,
            cache,
        }
    }

    fn seed_product(catalog: &InMemoryCatalog, price: u64, stock: u32) -> ProductId {
        let id = ProductId::new();
        catalog.upsert(ProductRecord {
            id,
            price,
            stock_quantity: stock,
            active: true,
        });
        id
    }

    /// Helper: wait a short time for the bus/worker side to settle.
    fn wait_for_processing() {
        std::thread::sleep(Duration::from_millis(50));
    }

    /// Cart store that fails the first `remaining_failures` saves with a
    /// version conflict, counting every attempt.
    struct FailingStore {
        inner: InMemoryCartStore,
        remaining_failures: AtomicU32,
        save_attempts: AtomicU32,
    }

    impl FailingStore {
        fn failing(times: u32) -> Self {
            Self {
                inner: InMemoryCartStore::new(),
                remaining_failures: AtomicU32::new(times),
                save_attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl CartStore for FailingStore {
        async fn load(&self, user_id: UserId) -> Result<Option<Cart>, CartStoreError> {
            self.inner.load(user_id).await
        }

        async fn load_or_create(&self, user_id: UserId) -> Result<Cart, CartStoreError> {
            self.inner.load_or_create(user_id).await
        }

        async fn save(
            &self,
            cart: &mut Cart,
            expected: ExpectedVersion,
        ) -> Result<u64, CartStoreError> {
            self.save_attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.remaining_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(CartStoreError::Conflict(
                    "simulated version race".to_string(),
                ));
            }
            self.inner.save(cart, expected).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_do_not_lose_updates() {
        let stack = setup();
        let user_id = UserId::new();
        let product_id = seed_product(&stack.catalog, 500, 10);

        // Six writers race on the same cart; a high budget lets every loser
        // eventually win a round.
        let service = Arc::new(
            CartService::new(
                Arc::clone(&stack.store),
                Arc::clone(&stack.catalog),
                Arc::clone(&stack.bus),
                Arc::clone(&stack.cache),
            )
            .with_retry_policy(RetryPolicy {
                max_attempts: 12,
                backoff: Duration::from_millis(5),
            }),
        );

        let mut handles = Vec::new();
        for _ in 0..6 {
            let svc = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                svc.add_item(user_id, product_id, 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = service.get_current_cart(user_id).await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 6);
        assert_eq!(snapshot.total_amount, 3000);

        // Six commits on top of the created cart.
        let cart = stack.store.load(user_id).await.unwrap().unwrap();
        assert_eq!(cart.version(), 7);
    }

    #[tokio::test]
    async fn save_conflicts_are_retried_until_success() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let product_id = seed_product(&catalog, 500, 10);

        let store = Arc::new(FailingStore::failing(2));
        let service = CartService::new(
            Arc::clone(&store),
            catalog,
            Arc::new(InMemoryEventBus::new()),
            Arc::new(InMemorySnapshotCache::new()),
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        });

        let snapshot = service
            .add_item(UserId::new(), product_id, 2)
            .await
            .unwrap();

        assert_eq!(snapshot.items[0].quantity, 2);
        assert_eq!(store.save_attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retry_budget_surfaces_as_concurrency() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let product_id = seed_product(&catalog, 500, 10);

        let store = Arc::new(FailingStore::failing(u32::MAX));
        let service = CartService::new(
            Arc::clone(&store),
            catalog,
            Arc::new(InMemoryEventBus::new()),
            Arc::new(InMemorySnapshotCache::new()),
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        });

        let err = service
            .add_item(UserId::new(), product_id, 2)
            .await
            .unwrap_err();

        assert!(matches!(err, CartServiceError::Concurrency(_)));
        assert_eq!(store.save_attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn vanished_product_cleanup_is_committed() {
        let stack = setup();
        let user_id = UserId::new();
        let keep = seed_product(&stack.catalog, 500, 10);
        let vanishing = seed_product(&stack.catalog, 900, 10);

        stack.service.add_item(user_id, keep, 1).await.unwrap();
        stack.service.add_item(user_id, vanishing, 2).await.unwrap();

        stack.catalog.remove(vanishing);

        let snapshot = stack.service.get_current_cart(user_id).await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].product_id, keep);

        // The cleanup is a real commit, not a projection-time filter.
        let cart = stack.store.load(user_id).await.unwrap().unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.version(), 4);
    }

    #[tokio::test]
    async fn merge_reports_merged_and_skipped_lines() {
        let stack = setup();
        let user_id = UserId::new();

        let landing = seed_product(&stack.catalog, 500, 10);
        let scarce = seed_product(&stack.catalog, 700, 2);
        let inactive = ProductId::new();
        stack.catalog.upsert(ProductRecord {
            id: inactive,
            price: 300,
            stock_quantity: 10,
            active: false,
        });
        let unknown = ProductId::new();

        let guest_lines = [
            GuestLine {
                product_id: landing,
                quantity: 4,
            },
            GuestLine {
                product_id: scarce,
                quantity: 5,
            },
            GuestLine {
                product_id: inactive,
                quantity: 1,
            },
            GuestLine {
                product_id: unknown,
                quantity: 1,
            },
            GuestLine {
                product_id: landing,
                quantity: 0,
            },
        ];

        let (summary, snapshot) = stack
            .service
            .merge_guest_cart(user_id, &guest_lines)
            .await
            .unwrap();

        assert_eq!(summary.merged, 1);
        assert_eq!(summary.skipped, 4);
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].product_id, landing);
        assert_eq!(snapshot.items[0].quantity, 4);
    }

    #[tokio::test]
    async fn update_on_inactive_product_is_not_found() {
        let stack = setup();
        let user_id = UserId::new();
        let product_id = seed_product(&stack.catalog, 500, 10);

        let snapshot = stack.service.add_item(user_id, product_id, 2).await.unwrap();
        let item_id = snapshot.items[0].id;

        stack.catalog.upsert(ProductRecord {
            id: product_id,
            price: 500,
            stock_quantity: 10,
            active: false,
        });

        let err = stack
            .service
            .update_item_quantity(user_id, item_id, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, CartServiceError::NotFound));
    }

    #[tokio::test]
    async fn removing_an_absent_line_commits_nothing() {
        let stack = setup();
        let user_id = UserId::new();
        let product_id = seed_product(&stack.catalog, 500, 10);

        // Subscribe first, then drain the add's event, so only a stray
        // no-op event could remain on the channel.
        let sub = stack.bus.subscribe();
        stack.service.add_item(user_id, product_id, 2).await.unwrap();
        sub.recv_timeout(Duration::from_secs(2)).unwrap();

        let snapshot = stack
            .service
            .remove_item(user_id, CartItemId::new())
            .await
            .unwrap();
        assert_eq!(snapshot.items.len(), 1);

        let cart = stack.store.load(user_id).await.unwrap().unwrap();
        assert_eq!(cart.version(), 2);

        wait_for_processing();
        assert!(sub.try_recv().is_err(), "no-op removal must not publish");
    }

    #[tokio::test]
    async fn published_events_carry_post_commit_totals() {
        let stack = setup();
        let user_id = UserId::new();
        let product_id = seed_product(&stack.catalog, 1200, 10);

        // Subscribe to the bus BEFORE any events are published.
        let sub = stack.bus.subscribe();

        stack.service.add_item(user_id, product_id, 2).await.unwrap();

        let event = sub.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.kind, CartEventKind::ItemAdded);
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.product_id, Some(product_id));
        assert_eq!(event.quantity, Some(2));
        assert_eq!(event.total_amount, 2400);
        assert_eq!(event.item_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn mutation_events_invalidate_the_snapshot_cache() {
        let stack = setup();
        let user_id = UserId::new();
        let product_id = seed_product(&stack.catalog, 500, 10);

        let worker = CacheInvalidator::spawn(
            "cache-invalidator-it",
            &stack.bus,
            Arc::clone(&stack.cache),
        );

        // Read-through primes the cache (an empty snapshot is cacheable too),
        // so exactly one event is ever in flight.
        stack.service.get_current_cart(user_id).await.unwrap();
        assert!(stack.cache.get(user_id).is_some());

        stack.service.add_item(user_id, product_id, 1).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline && stack.cache.get(user_id).is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(
            stack.cache.get(user_id).is_none(),
            "mutation event should drop the cached snapshot"
        );

        worker.shutdown();
    }
}
