//! `storefront-catalog` — catalog read contract consumed by the cart.
//!
//! The catalog itself (product management, pricing, stock mutation) is a
//! separate bounded context; this crate carries only the record shape the
//! cart reads.

pub mod product;

pub use product::ProductRecord;
