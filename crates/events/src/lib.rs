//! `storefront-events` — event contracts and pub/sub transport.
//!
//! Domain crates define their event payloads; this crate provides the shared
//! [`Event`] trait and the [`EventBus`] distribution mechanics.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
