//! Background consumers of the cart event stream.

pub mod cache_invalidator;

pub use cache_invalidator::{CacheInvalidator, WorkerHandle};
