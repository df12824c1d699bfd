//! Quantity/stock guard for cart mutations.
//!
//! Pure validation: no IO, no clock, no state. The guard runs inside the
//! mutation's read-modify-write cycle, immediately before commit, so the
//! stock snapshot it sees is as fresh as the surrounding transaction allows.
//! Stock changing between check and commit is an accepted residual race;
//! actual stock deduction happens at order placement, not here.

use storefront_core::{DomainError, DomainResult};

/// Maximum units of a single product one cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Validate a requested quantity change.
///
/// - `requested`: the amount asked for right now (the delta for an add, the
///   absolute target for an update)
/// - `available`: the product's current stock snapshot
/// - `resulting`: the line quantity the operation would leave behind
///
/// The quantity bound is checked before stock: a request outside
/// `(0, MAX_LINE_QUANTITY]` is invalid no matter what stock says.
pub fn check(requested: u32, available: u32, resulting: u32) -> DomainResult<()> {
    if requested == 0 {
        return Err(DomainError::invalid_quantity("quantity must be positive"));
    }

    if resulting > MAX_LINE_QUANTITY {
        return Err(DomainError::invalid_quantity(format!(
            "resulting quantity {resulting} exceeds the per-line maximum of {MAX_LINE_QUANTITY}"
        )));
    }

    if requested > available {
        return Err(DomainError::out_of_stock(requested, available));
    }

    Ok(())
}
