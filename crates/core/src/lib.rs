//! `storefront-core` — domain primitives shared by every other crate.
//!
//! Ids, the aggregate/entity traits, the version token, and the domain error
//! type. Anything that talks to a database, a cache, or a socket lives
//! further out.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CartId, CartItemId, ProductId, UserId};
