//! Infrastructure layer: cart persistence, catalog access, caching, event bus wiring.

pub mod cart_service;
pub mod cart_store;
pub mod catalog;
pub mod event_bus;
pub mod read_model;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use cart_service::{CartService, CartServiceError, RetryPolicy};
pub use cart_store::{CartStore, CartStoreError, InMemoryCartStore, PostgresCartStore};
pub use catalog::{CatalogError, CatalogReader, InMemoryCatalog, PostgresCatalog};
pub use read_model::{InMemorySnapshotCache, SnapshotCache};
pub use workers::{CacheInvalidator, WorkerHandle};
