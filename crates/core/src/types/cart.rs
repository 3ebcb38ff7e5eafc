//! Cart and line item model.
//!
//! A cart is an ordered sequence of line items keyed by `(product, variant)`.
//! Two invariants hold for every well-formed cart:
//!
//! - no two items share an identity key
//! - every quantity is strictly positive (zero-quantity items are removed,
//!   never retained)
//!
//! Violations indicate a bug in an upstream writer and are surfaced via
//! [`Cart::check_invariants`] rather than silently repaired.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{OwnerKey, ProductId, VariantId};
use super::price::Price;

/// The identity of a line item within a cart: the `(product, variant)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub product: ProductId,
    pub variant: Option<VariantId>,
}

impl ItemKey {
    /// Create an item key.
    pub fn new(product: impl Into<ProductId>, variant: Option<VariantId>) -> Self {
        Self {
            product: product.into(),
            variant,
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{variant}", self.product),
            None => write!(f, "{}", self.product),
        }
    }
}

/// A single cart line: one product variant at a quantity, with the unit
/// price observed when the item was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Strictly positive; a zero here is an invariant violation.
    pub quantity: u32,
    /// Unit price observed at add-to-cart time.
    pub unit_price: Price,
    /// When the item was added to its cart.
    pub added_at: DateTime<Utc>,
}

impl LineItem {
    /// The identity key of this line.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product: self.product_id.clone(),
            variant: self.variant_id.clone(),
        }
    }
}

/// A persisted cart: an owner, its ordered line items, and the optimistic
/// concurrency version used by the store's compare-and-set writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub owner: OwnerKey,
    pub items: Vec<LineItem>,
    pub updated_at: DateTime<Utc>,
    /// Monotonic counter, incremented by every committed store write.
    /// `0` means the cart has never been persisted.
    pub version: u64,
}

impl Cart {
    /// An empty, never-persisted cart for the given owner.
    #[must_use]
    pub fn empty(owner: OwnerKey) -> Self {
        Self {
            owner,
            items: Vec::new(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    /// A never-persisted cart holding the given items.
    #[must_use]
    pub fn with_items(owner: OwnerKey, items: Vec<LineItem>) -> Self {
        Self {
            owner,
            items,
            updated_at: Utc::now(),
            version: 0,
        }
    }

    /// Look up a line item by identity key.
    #[must_use]
    pub fn item(&self, key: &ItemKey) -> Option<&LineItem> {
        self.items.iter().find(|item| item.key() == *key)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Whether the cart holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Verify the cart invariants: unique identity keys, positive quantities.
    ///
    /// # Errors
    ///
    /// Returns the first violation found. Callers reading persisted state
    /// must fail fast on an error here instead of repairing it.
    pub fn check_invariants(&self) -> Result<(), CartInvariantError> {
        let mut seen = BTreeSet::new();
        for item in &self.items {
            let key = item.key();
            if item.quantity == 0 {
                return Err(CartInvariantError::NonPositiveQuantity(key));
            }
            if !seen.insert(key.clone()) {
                return Err(CartInvariantError::DuplicateItemKey(key));
            }
        }
        Ok(())
    }
}

/// A structural violation of the cart invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartInvariantError {
    /// Two line items share the same `(product, variant)` identity key.
    #[error("duplicate item key in cart: {0}")]
    DuplicateItemKey(ItemKey),

    /// A line item has a zero quantity.
    #[error("non-positive quantity for item: {0}")]
    NonPositiveQuantity(ItemKey),
}
