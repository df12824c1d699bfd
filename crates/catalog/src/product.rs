use serde::{Deserialize, Serialize};

use storefront_core::ProductId;

/// Catalog view of a sellable product, as consumed by the cart.
///
/// This is a read-side record, not the catalog's own aggregate: the cart only
/// needs the identifier, the current price, the available stock and whether
/// the product is still purchasable. Price is in the smallest currency unit
/// (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub price: u64,
    pub stock_quantity: u32,
    pub active: bool,
}

impl ProductRecord {
    /// Check if the product can currently be added to a cart.
    ///
    /// Inactive (archived/unpublished) products are treated the same as
    /// missing ones by cart operations.
    pub fn is_purchasable(&self) -> bool {
        self.active
    }
}
