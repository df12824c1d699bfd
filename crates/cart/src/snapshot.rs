use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use storefront_catalog::ProductRecord;
use storefront_core::{CartId, CartItemId, ProductId};

use crate::cart::Cart;

/// Read-side view of one cart line, enriched with live stock signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: u64,
    pub subtotal: u64,
    pub stock_quantity: u32,
    /// The product currently has no stock at all.
    pub out_of_stock: bool,
    /// The line holds more units than the product has in stock.
    pub over_stock: bool,
}

/// Read-side view of a whole cart, the shape returned to callers.
///
/// `id` is `None` for users who have no cart yet; reads never create one.
/// Deserialize is for the cross-process snapshot cache, not the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub id: Option<CartId>,
    pub items: Vec<CartLineView>,
    pub total_amount: u64,
    pub item_count: u32,
}

impl CartSnapshot {
    /// The snapshot of "no cart": no id, no lines, zero totals.
    pub fn empty() -> Self {
        Self {
            id: None,
            items: Vec::new(),
            total_amount: 0,
            item_count: 0,
        }
    }

    /// Project a cart against the current catalog records.
    ///
    /// Pure function of its inputs. A line whose product is missing from
    /// `products` (deleted after the last cleanup) renders with zero stock and
    /// both stock flags raised; the next cart read prunes it.
    pub fn project(cart: &Cart, products: &HashMap<ProductId, ProductRecord>) -> Self {
        let items: Vec<CartLineView> = cart
            .items()
            .iter()
            .map(|line| {
                let stock = products
                    .get(&line.product_id())
                    .map(|p| p.stock_quantity)
                    .unwrap_or(0);

                CartLineView {
                    id: line.id_typed(),
                    product_id: line.product_id(),
                    quantity: line.quantity(),
                    unit_price: line.unit_price(),
                    subtotal: line.subtotal(),
                    stock_quantity: stock,
                    out_of_stock: stock == 0,
                    over_stock: line.quantity() > stock,
                }
            })
            .collect();

        Self {
            id: Some(cart.id_typed()),
            items,
            total_amount: cart.total_amount(),
            item_count: cart.item_count(),
        }
    }
}
