//! Disposable read-side state: the cart snapshot cache.

pub mod snapshot_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use snapshot_cache::{InMemorySnapshotCache, SnapshotCache};

#[cfg(feature = "redis")]
pub use redis_cache::RedisSnapshotCache;
