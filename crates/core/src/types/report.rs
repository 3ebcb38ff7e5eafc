//! Read models produced by cart reconciliation.
//!
//! [`MergeResult`] describes what the merge engine did with two carts;
//! [`ValidityReport`] itemizes everything the validator found wrong with a
//! cart before checkout. Both are plain data for UI consumption - neither
//! mutates stored state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::cart::{Cart, ItemKey};
use super::price::Price;

/// Outcome of merging a guest cart into a user cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    /// The merged cart, owned by the user key.
    pub merged_cart: Cart,
    /// Keys present in both inputs whose quantities were summed.
    pub items_combined: BTreeSet<ItemKey>,
    /// Keys present only in the guest cart.
    pub items_kept_from_guest: BTreeSet<ItemKey>,
    /// Keys present only in the user cart.
    pub items_kept_from_user: BTreeSet<ItemKey>,
}

/// Why the validator removed an item from consideration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Stock is zero.
    OutOfStock,
    /// Product is no longer listed.
    Delisted,
    /// Price moved beyond the configured tolerance; requires re-confirmation.
    PriceChanged,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::OutOfStock => "out_of_stock",
            Self::Delisted => "delisted",
            Self::PriceChanged => "price_changed",
        };
        write!(f, "{reason}")
    }
}

/// An item the validator removed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedItem {
    pub key: ItemKey,
    pub reason: RemovalReason,
}

/// An item whose quantity was capped to available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CappedItem {
    pub key: ItemKey,
    pub requested: u32,
    pub allowed: u32,
}

/// An informational price movement within tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    pub key: ItemKey,
    pub old: Price,
    pub new: Price,
}

/// Itemized outcome of validating a cart against live inventory.
///
/// `valid` is true only when nothing was removed, capped, or unknown;
/// price changes within tolerance are informational and do not block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidityReport {
    pub valid: bool,
    pub removed_items: Vec<RemovedItem>,
    pub capped_items: Vec<CappedItem>,
    pub price_changes: Vec<PriceChange>,
    /// Items whose inventory lookup failed; correctness could not be
    /// confirmed, so these force `valid` to false without removing the item.
    pub unknown_items: Vec<ItemKey>,
}

impl ValidityReport {
    /// A report for a cart with nothing to flag.
    #[must_use]
    pub fn all_clear() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }
}
