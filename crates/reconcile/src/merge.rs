//! Merge engine: reconcile a guest cart into a user cart at login.
//!
//! Pure function, no I/O. The merged cart is always owned by the user key
//! and carries the user cart's version, so a caller can hand it straight to
//! `CartStore::put` as a compare-and-set against the user cart it just read.
//!
//! For each identity key in the union of both carts:
//! - only in the guest cart: kept with the guest quantity
//! - only in the user cart: kept with the user quantity
//! - in both: quantities are summed; the more recently added side's price
//!   snapshot and `added_at` win, and on a tie the user cart's snapshot wins
//!   (the user cart is authoritative for price, since it may reflect
//!   logged-in pricing)
//!
//! Items are ordered by `added_at` ascending with identity-key lexical order
//! as the tie-break, so identical inputs always produce identical output.

use std::collections::BTreeSet;

use chrono::Utc;

use cartsync_core::{Cart, LineItem, MergeResult};

/// Merge a guest cart into a user cart.
///
/// The inputs are read-only; the result is a new cart. Merging an empty
/// guest cart reproduces the user cart's items unchanged (callers still
/// persist the result so downstream invalidation fires), and merging into an
/// empty user cart re-owns the guest items under the user key.
#[must_use]
pub fn merge(guest: &Cart, user: &Cart) -> MergeResult {
    let mut items_combined = BTreeSet::new();
    let mut items_kept_from_guest = BTreeSet::new();
    let mut items_kept_from_user = BTreeSet::new();
    let mut items: Vec<LineItem> = Vec::with_capacity(guest.items.len() + user.items.len());

    for guest_item in &guest.items {
        let key = guest_item.key();
        if let Some(user_item) = user.item(&key) {
            // Most recently added side wins the snapshot; ties go to the user.
            let (unit_price, added_at) = if guest_item.added_at > user_item.added_at {
                (guest_item.unit_price, guest_item.added_at)
            } else {
                (user_item.unit_price, user_item.added_at)
            };
            items.push(LineItem {
                product_id: guest_item.product_id.clone(),
                variant_id: guest_item.variant_id.clone(),
                quantity: guest_item.quantity.saturating_add(user_item.quantity),
                unit_price,
                added_at,
            });
            items_combined.insert(key);
        } else {
            items.push(guest_item.clone());
            items_kept_from_guest.insert(key);
        }
    }

    for user_item in &user.items {
        let key = user_item.key();
        if guest.item(&key).is_none() {
            items.push(user_item.clone());
            items_kept_from_user.insert(key);
        }
    }

    items.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.key().cmp(&b.key())));

    MergeResult {
        merged_cart: Cart {
            owner: user.owner.clone(),
            items,
            updated_at: Utc::now(),
            // Base version for the caller's compare-and-set write.
            version: user.version,
        },
        items_combined,
        items_kept_from_guest,
        items_kept_from_user,
    }
}
