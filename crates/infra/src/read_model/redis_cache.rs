//! Redis-backed snapshot cache (optional).
//!
//! Entries carry a TTL so stale snapshots age out even if an invalidation is
//! lost (Redis pub/sub is not durable). Any Redis failure degrades to a cache
//! miss: callers reproject from the store and answers stay correct.

use std::time::Duration;

use redis::Commands;
use tracing::warn;

use storefront_cart::CartSnapshot;
use storefront_core::UserId;

use super::snapshot_cache::SnapshotCache;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

fn cache_key(user_id: UserId) -> String {
    format!("cart:snapshot:{user_id}")
}

/// Redis snapshot cache for multi-instance deployments.
#[derive(Debug, Clone)]
pub struct RedisSnapshotCache {
    client: redis::Client,
    ttl: Duration,
}

impl RedisSnapshotCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url.as_ref())?;
        Ok(Self {
            client,
            ttl: DEFAULT_TTL,
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl SnapshotCache for RedisSnapshotCache {
    fn get(&self, user_id: UserId) -> Option<CartSnapshot> {
        let mut conn = match self.client.get_connection() {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "snapshot cache get failed, treating as miss");
                return None;
            }
        };

        let payload: Option<String> = match conn.get(cache_key(user_id)) {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "snapshot cache get failed, treating as miss");
                return None;
            }
        };

        let payload = payload?;
        match serde_json::from_str(&payload) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(error = %err, "stale snapshot payload, treating as miss");
                None
            }
        }
    }

    fn put(&self, user_id: UserId, snapshot: CartSnapshot) {
        let payload = match serde_json::to_string(&snapshot) {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "snapshot serialization failed, skipping cache put");
                return;
            }
        };

        let mut conn = match self.client.get_connection() {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "snapshot cache put failed");
                return;
            }
        };

        let result: Result<(), redis::RedisError> =
            conn.set_ex(cache_key(user_id), payload, self.ttl.as_secs());
        if let Err(err) = result {
            warn!(error = %err, "snapshot cache put failed");
        }
    }

    fn invalidate(&self, user_id: UserId) {
        let mut conn = match self.client.get_connection() {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "snapshot cache invalidation failed, TTL will expire it");
                return;
            }
        };

        let result: Result<(), redis::RedisError> = conn.del(cache_key(user_id));
        if let Err(err) = result {
            warn!(error = %err, "snapshot cache invalidation failed, TTL will expire it");
        }
    }
}
