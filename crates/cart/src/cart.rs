use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use storefront_catalog::ProductRecord;
use storefront_core::{AggregateRoot, CartId, CartItemId, DomainError, DomainResult, ProductId, UserId};

use crate::item::CartItem;
use crate::policy::{self, MAX_LINE_QUANTITY};

/// One line of a guest cart handed over at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Per-line result of a guest-cart merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeLineOutcome {
    /// The line landed in the cart (possibly capped at the per-line maximum).
    Merged,
    /// The line was dropped (zero quantity, unknown product, or insufficient stock).
    Skipped,
}

/// Counts reported back from a guest-cart merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub merged: u32,
    pub skipped: u32,
}

impl MergeSummary {
    pub fn record(&mut self, outcome: MergeLineOutcome) {
        match outcome {
            MergeLineOutcome::Merged => self.merged += 1,
            MergeLineOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Aggregate root: one user's shopping cart.
///
/// The cart owns its lines exclusively; lines are created, updated and removed
/// only through cart methods, inside a cart-scoped transaction. The version
/// counter is the single unit of optimistic concurrency for the whole
/// collection and is assigned by the store on each successful commit, never
/// mutated by domain methods.
///
/// All mutation methods are guard-first: on error the cart is left exactly as
/// it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    items: Vec<CartItem>,
    version: u64,
}

impl Cart {
    /// Create a fresh, not-yet-persisted cart for a user.
    ///
    /// Version starts at 0; the store assigns 1 when the cart row is first
    /// written.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            items: Vec::new(),
            version: 0,
        }
    }

    /// Rebuild a cart from persisted state.
    pub fn rehydrate(id: CartId, user_id: UserId, items: Vec<CartItem>, version: u64) -> Self {
        Self {
            id,
            user_id,
            items,
            version,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find_item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id_typed() == item_id)
    }

    pub fn find_line_for_product(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id() == product_id)
    }

    /// Sum of line subtotals, in the smallest currency unit.
    pub fn total_amount(&self) -> u64 {
        self.items.iter().map(|i| i.subtotal()).sum()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity()).sum()
    }

    /// Store-assigned version bump. Called by stores on successful commit and
    /// by rehydration only.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Add `quantity` units of a product, merging into an existing line.
    ///
    /// The quantity guard checks the *added* amount against stock and the
    /// *resulting* line quantity against the per-line cap. A merge refreshes
    /// the line's unit price to the just-validated catalog price.
    ///
    /// Callers resolve `product` from the catalog first; unknown or inactive
    /// products never reach this method.
    pub fn add_item(&mut self, product: &ProductRecord, quantity: u32) -> DomainResult<CartItemId> {
        let current = self
            .find_line_for_product(product.id)
            .map(|i| i.quantity())
            .unwrap_or(0);

        let resulting = current.saturating_add(quantity);
        policy::check(quantity, product.stock_quantity, resulting)?;

        if let Some(line) = self.items.iter_mut().find(|i| i.product_id() == product.id) {
            line.set_quantity(resulting);
            line.set_unit_price(product.price);
            Ok(line.id_typed())
        } else {
            let line = CartItem::new(product.id, quantity, product.price);
            let id = line.id_typed();
            self.items.push(line);
            Ok(id)
        }
    }

    /// Set a line to an absolute quantity.
    ///
    /// Zero-quantity updates are routed through [`Cart::remove_item`] by the
    /// caller; here a positive target is required and checked against both the
    /// per-line cap and current stock.
    pub fn set_item_quantity(
        &mut self,
        item_id: CartItemId,
        quantity: u32,
        product: &ProductRecord,
    ) -> DomainResult<()> {
        if self.find_item(item_id).is_none() {
            return Err(DomainError::not_found());
        }

        policy::check(quantity, product.stock_quantity, quantity)?;

        if let Some(line) = self.items.iter_mut().find(|i| i.id_typed() == item_id) {
            line.set_quantity(quantity);
        }
        Ok(())
    }

    /// Remove a line. Returns the removed line, or `None` if it was already
    /// gone (idempotent).
    pub fn remove_item(&mut self, item_id: CartItemId) -> Option<CartItem> {
        let idx = self.items.iter().position(|i| i.id_typed() == item_id)?;
        Some(self.items.remove(idx))
    }

    /// Remove every line. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Merge one guest line using add semantics, but capped instead of failing
    /// at the per-line maximum.
    ///
    /// Lenient by design: a line that cannot land is skipped, never an error.
    /// A line already at the cap counts as merged (nothing left to add).
    pub fn merge_item(&mut self, product: &ProductRecord, quantity: u32) -> MergeLineOutcome {
        if quantity == 0 {
            return MergeLineOutcome::Skipped;
        }

        let current = self
            .find_line_for_product(product.id)
            .map(|i| i.quantity())
            .unwrap_or(0);

        let capped = current.saturating_add(quantity).min(MAX_LINE_QUANTITY);
        let delta = capped - current;

        if delta == 0 {
            // Existing line already at the cap.
            return MergeLineOutcome::Merged;
        }

        if delta > product.stock_quantity {
            return MergeLineOutcome::Skipped;
        }

        if let Some(line) = self.items.iter_mut().find(|i| i.product_id() == product.id) {
            line.set_quantity(capped);
            line.set_unit_price(product.price);
        } else {
            self.items.push(CartItem::new(product.id, capped, product.price));
        }

        MergeLineOutcome::Merged
    }

    /// Drop lines whose product no longer resolves in the catalog.
    ///
    /// `existing` is the set of product ids the catalog still knows (active or
    /// not; inactive products keep their lines and are reported through stock
    /// flags instead). Returns the removed lines.
    pub fn remove_missing_products(&mut self, existing: &HashSet<ProductId>) -> Vec<CartItem> {
        let mut removed = Vec::new();
        self.items.retain(|line| {
            if existing.contains(&line.product_id()) {
                true
            } else {
                removed.push(line.clone());
                false
            }
        });
        removed
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
