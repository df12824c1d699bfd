//! Versioned cart persistence boundary.
//!
//! This module defines the storage-facing abstraction for loading and saving
//! user carts without making storage assumptions. Every write goes through a
//! compare-and-swap on the cart's version column; callers resolve losers by
//! reloading and retrying.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCartStore;
pub use postgres::PostgresCartStore;
pub use r#trait::{CartStore, CartStoreError};
