use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use storefront_cart::CartSnapshot;
use storefront_core::UserId;

/// Per-user cache of projected cart snapshots.
///
/// The cache is disposable read-side state: a miss is always answered by
/// reprojecting from the store, so every operation is infallible and a broken
/// cache degrades to extra reads, never to wrong answers. Mutations
/// invalidate; the next read repopulates.
pub trait SnapshotCache: Send + Sync {
    fn get(&self, user_id: UserId) -> Option<CartSnapshot>;
    fn put(&self, user_id: UserId, snapshot: CartSnapshot);
    fn invalidate(&self, user_id: UserId);
}

impl<C> SnapshotCache for Arc<C>
where
    C: SnapshotCache + ?Sized,
{
    fn get(&self, user_id: UserId) -> Option<CartSnapshot> {
        (**self).get(user_id)
    }

    fn put(&self, user_id: UserId, snapshot: CartSnapshot) {
        (**self).put(user_id, snapshot)
    }

    fn invalidate(&self, user_id: UserId) {
        (**self).invalidate(user_id)
    }
}

/// In-memory snapshot cache for tests/dev and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemorySnapshotCache {
    inner: RwLock<HashMap<UserId, CartSnapshot>>,
}

impl InMemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for InMemorySnapshotCache {
    fn get(&self, user_id: UserId) -> Option<CartSnapshot> {
        let map = self.inner.read().ok()?;
        map.get(&user_id).cloned()
    }

    fn put(&self, user_id: UserId, snapshot: CartSnapshot) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(user_id, snapshot);
        }
    }

    fn invalidate(&self, user_id: UserId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&user_id);
        }
    }
}
