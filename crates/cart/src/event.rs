use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{CartId, ProductId, UserId};
use storefront_events::Event;

use crate::cart::Cart;

/// What happened to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartEventKind {
    ItemAdded,
    ItemUpdated,
    ItemRemoved,
    Cleared,
    Merged,
}

/// Event: the cart changed.
///
/// Published after every successful mutating commit, outside the transactional
/// boundary. Consumers (the snapshot cache invalidator) treat it as a signal,
/// not as state: `total_amount`/`item_count` describe the cart as committed
/// but the store remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartChangedEvent {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub kind: CartEventKind,
    /// The product a line-level change touched; `None` for cart-level changes
    /// (clear, merge).
    pub product_id: Option<ProductId>,
    /// Resulting line quantity for add/update; `None` otherwise.
    pub quantity: Option<u32>,
    pub total_amount: u64,
    pub item_count: u32,
    pub occurred_at: DateTime<Utc>,
}

impl CartChangedEvent {
    /// Build an event from the post-mutation cart state.
    pub fn record(
        cart: &Cart,
        kind: CartEventKind,
        product_id: Option<ProductId>,
        quantity: Option<u32>,
    ) -> Self {
        Self {
            cart_id: cart.id_typed(),
            user_id: cart.user_id(),
            kind,
            product_id,
            quantity,
            total_amount: cart.total_amount(),
            item_count: cart.item_count(),
            occurred_at: Utc::now(),
        }
    }
}

impl Event for CartChangedEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            CartEventKind::ItemAdded => "cart.item_added",
            CartEventKind::ItemUpdated => "cart.item_updated",
            CartEventKind::ItemRemoved => "cart.item_removed",
            CartEventKind::Cleared => "cart.cleared",
            CartEventKind::Merged => "cart.merged",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
