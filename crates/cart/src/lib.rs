//! Shopping cart domain module.
//!
//! This crate contains the cart's business rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Carts mutate
//! state directly under an optimistic version counter owned by the store;
//! there is no event-sourced history, only change notifications.

pub mod cart;
pub mod event;
pub mod item;
pub mod policy;
pub mod snapshot;

pub use cart::{Cart, GuestLine, MergeLineOutcome, MergeSummary};
pub use event::{CartChangedEvent, CartEventKind};
pub use item::CartItem;
pub use policy::MAX_LINE_QUANTITY;
pub use snapshot::{CartLineView, CartSnapshot};
