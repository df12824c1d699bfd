//! Infrastructure event bus implementations.
//!
//! The core event bus abstraction lives in `storefront-events` as pure
//! mechanics. This module provides infrastructure-backed implementations
//! (e.g. Redis) for fanning cart change events out across processes.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus, CART_EVENTS_CHANNEL};
