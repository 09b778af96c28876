//! Authoritative in-memory cart.
//!
//! The [`Cart`] enforces the two structural invariants of every replica:
//! at most one line per product, and every line has a positive quantity.
//! Lines keep their insertion order so the UI lists them stably.

use std::collections::BTreeSet;

use crumb_core::{MinimalCartLine, ProductId, Quantity, VariantId};
use indexmap::IndexMap;

/// What a single-line mutation did to the cart.
///
/// The reconciler maps this onto the remote store: `Upserted` becomes an
/// upsert, `Removed` a delete, `Unchanged` nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    /// The line now holds this value.
    Upserted(MinimalCartLine),
    /// The line for this product is gone.
    Removed(ProductId),
    /// Nothing changed.
    Unchanged,
}

/// Cart keyed by product id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: IndexMap<ProductId, MinimalCartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from lines. A later line for the same product replaces
    /// an earlier one in place.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = MinimalCartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.lines.insert(line.product_id.clone(), line);
        }
        cart
    }

    /// Iterate lines in insertion order.
    pub fn lines(&self) -> impl Iterator<Item = &MinimalCartLine> {
        self.lines.values()
    }

    /// Copy the lines out, in insertion order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<MinimalCartLine> {
        self.lines.values().cloned().collect()
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&MinimalCartLine> {
        self.lines.get(product_id)
    }

    /// Whether the cart has a line for this product.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.lines.contains_key(product_id)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.values().map(|l| u64::from(l.quantity.get())).sum()
    }

    /// The set of product ids, for batch lookups.
    #[must_use]
    pub fn product_ids(&self) -> BTreeSet<ProductId> {
        self.lines.keys().cloned().collect()
    }

    /// Add `quantity` of a product.
    ///
    /// An existing line is incremented (clamped at [`Quantity::MAX`]) and
    /// takes the new variant; otherwise a line is appended.
    pub fn add(
        &mut self,
        product_id: ProductId,
        variant_id: VariantId,
        quantity: Quantity,
    ) -> LineChange {
        let line = match self.lines.get_mut(&product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(quantity);
                existing.variant_id = variant_id;
                existing.clone()
            }
            None => {
                let line = MinimalCartLine::new(product_id.clone(), variant_id, quantity);
                self.lines.insert(product_id, line.clone());
                line
            }
        };
        LineChange::Upserted(line)
    }

    /// Set the quantity of a product already in the cart.
    ///
    /// `0` removes the line. Products not in the cart are left alone: there
    /// is no variant to create a line with.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> LineChange {
        let Ok(quantity) = Quantity::new(quantity) else {
            return self.remove(product_id);
        };

        match self.lines.get_mut(product_id) {
            Some(existing) => {
                existing.quantity = quantity;
                LineChange::Upserted(existing.clone())
            }
            None => LineChange::Unchanged,
        }
    }

    /// Remove a product's line.
    pub fn remove(&mut self, product_id: &ProductId) -> LineChange {
        match self.lines.shift_remove(product_id) {
            Some(_) => LineChange::Removed(product_id.clone()),
            None => LineChange::Unchanged,
        }
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Outcome of merging a device-local cart into a remote one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merge {
    /// Remote lines first, then local-only lines.
    pub cart: Cart,
    /// Local-only lines that must be pushed to the remote store.
    pub to_push: Vec<MinimalCartLine>,
}

/// Merge local lines into remote lines.
///
/// Remote quantity wins when both sides hold the same product; lines only
/// present locally are added. The function is pure, so merging the same
/// inputs twice gives the same cart.
#[must_use]
pub fn merge_remote_wins(local: &[MinimalCartLine], remote: &[MinimalCartLine]) -> Merge {
    let mut cart = Cart::from_lines(remote.iter().cloned());
    let mut to_push = Vec::new();

    for line in local {
        if !cart.contains(&line.product_id) {
            cart.lines.insert(line.product_id.clone(), line.clone());
            to_push.push(line.clone());
        }
    }

    Merge { cart, to_push }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: &str, quantity: u32) -> MinimalCartLine {
        MinimalCartLine::new(
            ProductId::new(product),
            VariantId::new(format!("{product}-v")),
            Quantity::new(quantity).unwrap(),
        )
    }

    fn pairs(cart: &Cart) -> Vec<(&str, u32)> {
        cart.lines()
            .map(|l| (l.product_id.as_str(), l.quantity.get()))
            .collect()
    }

    #[test]
    fn test_add_new_then_increment() {
        let mut cart = Cart::new();
        let qty = Quantity::new(2).unwrap();
        cart.add(ProductId::new("a"), VariantId::new("a-v"), qty);
        let change = cart.add(ProductId::new("a"), VariantId::new("a-v2"), qty);

        assert_eq!(cart.len(), 1);
        let LineChange::Upserted(line) = change else {
            panic!("expected upsert");
        };
        assert_eq!(line.quantity.get(), 4);
        assert_eq!(line.variant_id.as_str(), "a-v2");
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::from_lines([line("a", 2), line("b", 1)]);
        let change = cart.set_quantity(&ProductId::new("a"), 0);

        assert_eq!(change, LineChange::Removed(ProductId::new("a")));
        assert!(!cart.contains(&ProductId::new("a")));
        assert_eq!(pairs(&cart), [("b", 1)]);
    }

    #[test]
    fn test_set_quantity_on_missing_product_is_noop() {
        let mut cart = Cart::from_lines([line("a", 2)]);
        assert_eq!(cart.set_quantity(&ProductId::new("z"), 3), LineChange::Unchanged);
        assert_eq!(cart.set_quantity(&ProductId::new("z"), 0), LineChange::Unchanged);
        assert_eq!(pairs(&cart), [("a", 2)]);
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let mut cart = Cart::from_lines([line("a", 2)]);
        cart.set_quantity(&ProductId::new("a"), 7);
        assert_eq!(pairs(&cart), [("a", 7)]);
    }

    #[test]
    fn test_remove_keeps_order_of_remaining_lines() {
        let mut cart = Cart::from_lines([line("a", 1), line("b", 1), line("c", 1)]);
        cart.remove(&ProductId::new("b"));
        assert_eq!(pairs(&cart), [("a", 1), ("c", 1)]);
    }

    #[test]
    fn test_from_lines_collapses_duplicates() {
        let cart = Cart::from_lines([line("a", 1), line("b", 1), line("a", 5)]);
        assert_eq!(pairs(&cart), [("a", 5), ("b", 1)]);
    }

    #[test]
    fn test_uniqueness_over_mixed_sequence() {
        let mut cart = Cart::new();
        let one = Quantity::ONE;
        for (i, product) in ["a", "b", "a", "c", "b", "a"].iter().enumerate() {
            cart.add(ProductId::new(*product), VariantId::new("v"), one);
            if i % 2 == 0 {
                cart.set_quantity(&ProductId::new(*product), u32::try_from(i).unwrap());
            }
        }

        let ids: Vec<_> = cart.lines().map(|l| l.product_id.clone()).collect();
        let unique: BTreeSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), unique.len());
        assert!(cart.lines().all(|l| l.quantity.get() >= 1));
    }

    #[test]
    fn test_merge_remote_wins_and_local_only_is_additive() {
        let local = [line("A", 2), line("B", 1)];
        let remote = [line("B", 3), line("C", 1)];

        let merge = merge_remote_wins(&local, &remote);

        assert_eq!(pairs(&merge.cart), [("B", 3), ("C", 1), ("A", 2)]);
        assert_eq!(merge.to_push, vec![line("A", 2)]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let local = [line("A", 2), line("B", 1)];
        let remote = [line("B", 3), line("C", 1)];

        let first = merge_remote_wins(&local, &remote);
        let second = merge_remote_wins(&local, &remote);
        assert_eq!(first, second);

        // Re-merging against the already-pushed remote state pushes nothing.
        let again = merge_remote_wins(&local, &first.cart.to_vec());
        assert_eq!(again.cart, first.cart);
        assert!(again.to_push.is_empty());
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let merge = merge_remote_wins(&[], &[]);
        assert!(merge.cart.is_empty());

        let merge = merge_remote_wins(&[line("A", 1)], &[]);
        assert_eq!(pairs(&merge.cart), [("A", 1)]);
        assert_eq!(merge.to_push.len(), 1);
    }
}
