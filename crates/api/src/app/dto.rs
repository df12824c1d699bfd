use serde::Deserialize;

use storefront_cart::GuestLine;
use storefront_core::ProductId;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct MergeCartRequest {
    pub items: Vec<MergeCartLine>,
}

#[derive(Debug, Deserialize)]
pub struct MergeCartLine {
    pub product_id: String,
    pub quantity: u32,
}

// -------------------------
// Mapping helpers
// -------------------------
//
// Responses need no DTO layer: `CartSnapshot` serializes to the wire shape
// directly. Requests carry ids as strings so a malformed id maps to a 400
// with the shared error body instead of a deserializer rejection.

/// Parse merge request lines into domain guest lines.
///
/// Fails on the first unparsable product id; merge leniency applies to
/// catalog state, not to garbage input.
pub fn to_guest_lines(items: &[MergeCartLine]) -> Result<Vec<GuestLine>, String> {
    items
        .iter()
        .map(|line| {
            let product_id: ProductId = line
                .product_id
                .parse()
                .map_err(|_| format!("invalid product id: {}", line.product_id))?;
            Ok(GuestLine {
                product_id,
                quantity: line.quantity,
            })
        })
        .collect()
}
