use std::sync::Arc;

use storefront_cart::{CartChangedEvent, CartSnapshot, GuestLine, MergeSummary};
use storefront_core::{CartItemId, ProductId, UserId};
use storefront_events::InMemoryEventBus;
use storefront_infra::{
    cart_service::{CartService, CartServiceError},
    cart_store::InMemoryCartStore,
    catalog::InMemoryCatalog,
    read_model::InMemorySnapshotCache,
    workers::CacheInvalidator,
};

#[cfg(feature = "redis")]
use storefront_infra::{
    cart_store::PostgresCartStore,
    catalog::PostgresCatalog,
    event_bus::{CART_EVENTS_CHANNEL, RedisPubSubEventBus},
    read_model::RedisSnapshotCache,
};
#[cfg(feature = "redis")]
use sqlx::PgPool;

/// Cart service over the in-memory stack (dev/test).
pub type InMemoryCartService = CartService<
    Arc<InMemoryCartStore>,
    Arc<InMemoryCatalog>,
    Arc<InMemoryEventBus<CartChangedEvent>>,
    Arc<InMemorySnapshotCache>,
>;

/// Cart service over Postgres + Redis (production).
#[cfg(feature = "redis")]
pub type PersistentCartService =
    CartService<PostgresCartStore, PostgresCatalog, RedisPubSubEventBus, RedisSnapshotCache>;

/// Service stack behind the HTTP handlers.
///
/// Both variants run the same [`CartService`] pipeline; only the injected
/// infrastructure differs. Handlers go through the fan-out methods below and
/// never see which stack is live.
#[derive(Clone)]
pub enum AppServices {
    InMemory {
        cart: Arc<InMemoryCartService>,
        catalog: Arc<InMemoryCatalog>,
        bus: Arc<InMemoryEventBus<CartChangedEvent>>,
        cache: Arc<InMemorySnapshotCache>,
    },
    #[cfg(feature = "redis")]
    Persistent {
        cart: Arc<PersistentCartService>,
    },
}

impl AppServices {
    pub async fn get_current_cart(
        &self,
        user_id: UserId,
    ) -> Result<CartSnapshot, CartServiceError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.get_current_cart(user_id).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart } => cart.get_current_cart(user_id).await,
        }
    }

    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, CartServiceError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.add_item(user_id, product_id, quantity).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart } => cart.add_item(user_id, product_id, quantity).await,
        }
    }

    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartSnapshot, CartServiceError> {
        match self {
            AppServices::InMemory { cart, .. } => {
                cart.update_item_quantity(user_id, item_id, quantity).await
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart } => {
                cart.update_item_quantity(user_id, item_id, quantity).await
            }
        }
    }

    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<CartSnapshot, CartServiceError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.remove_item(user_id, item_id).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart } => cart.remove_item(user_id, item_id).await,
        }
    }

    pub async fn clear_cart(&self, user_id: UserId) -> Result<CartSnapshot, CartServiceError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.clear_cart(user_id).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart } => cart.clear_cart(user_id).await,
        }
    }

    pub async fn merge_guest_cart(
        &self,
        user_id: UserId,
        guest_lines: &[GuestLine],
    ) -> Result<(MergeSummary, CartSnapshot), CartServiceError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.merge_guest_cart(user_id, guest_lines).await,
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart } => cart.merge_guest_cart(user_id, guest_lines).await,
        }
    }
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true needs the redis feature, staying in-memory"
            );
            return build_in_memory_services();
        }
    }

    build_in_memory_services()
}

pub fn build_in_memory_services() -> AppServices {
    // In-memory infra wiring (dev/test): store + catalog + bus + cache.
    let catalog = Arc::new(InMemoryCatalog::new());
    let bus: Arc<InMemoryEventBus<CartChangedEvent>> = Arc::new(InMemoryEventBus::new());
    let cache = Arc::new(InMemorySnapshotCache::new());

    // Subscribes before any request is served; the handle is dropped on
    // purpose, which detaches the worker for the process lifetime.
    let _ = CacheInvalidator::spawn("cache-invalidator", &bus, Arc::clone(&cache));

    let cart = Arc::new(CartService::new(
        Arc::new(InMemoryCartStore::new()),
        Arc::clone(&catalog),
        Arc::clone(&bus),
        Arc::clone(&cache),
    ));

    AppServices::InMemory {
        cart,
        catalog,
        bus,
        cache,
    }
}

#[cfg(feature = "redis")]
async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to reach Postgres");

    let store = PostgresCartStore::new(pool.clone());
    store
        .ensure_schema()
        .await
        .expect("Failed to create cart tables");

    let catalog = PostgresCatalog::new(pool);
    catalog
        .ensure_schema()
        .await
        .expect("Failed to create products table");

    let bus = RedisPubSubEventBus::new(&redis_url, CART_EVENTS_CHANNEL)
        .expect("Failed to create Redis pub/sub event bus");

    let cache =
        RedisSnapshotCache::new(&redis_url).expect("Failed to create Redis snapshot cache");

    // Cross-instance invalidation: every instance consumes the shared channel
    // and clears its reads through the shared cache.
    let _ = CacheInvalidator::spawn("cache-invalidator", &bus, cache.clone());

    let cart = Arc::new(CartService::new(store, catalog, bus, cache));

    AppServices::Persistent { cart }
}
