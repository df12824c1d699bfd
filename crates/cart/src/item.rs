use serde::{Deserialize, Serialize};

use storefront_core::{CartItemId, Entity, ProductId};

/// A single cart line: one product at a quantity.
///
/// Lines are owned exclusively by their cart and only ever mutated through
/// it; there is no standalone line lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    id: CartItemId,
    product_id: ProductId,
    quantity: u32,
    unit_price: u64,
}

impl CartItem {
    pub fn new(product_id: ProductId, quantity: u32, unit_price: u64) -> Self {
        Self {
            id: CartItemId::new(),
            product_id,
            quantity,
            unit_price,
        }
    }

    /// Rebuild a line from persisted state.
    pub fn rehydrate(id: CartItemId, product_id: ProductId, quantity: u32, unit_price: u64) -> Self {
        Self {
            id,
            product_id,
            quantity,
            unit_price,
        }
    }

    pub fn id_typed(&self) -> CartItemId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price in the smallest currency unit, captured from the catalog at
    /// the last add/merge touching this line.
    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    /// Line total: `unit_price * quantity`.
    pub fn subtotal(&self) -> u64 {
        self.unit_price * u64::from(self.quantity)
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    pub(crate) fn set_unit_price(&mut self, unit_price: u64) {
        self.unit_price = unit_price;
    }
}

impl Entity for CartItem {
    type Id = CartItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
