//! Checkout preloader: warm cart and validity state ahead of checkout.
//!
//! Read-side only. Fetching the cart and validating it never mutates the
//! store, so the preloader is safe to run while a login merge is in flight;
//! the compare-and-set store guarantees it can at worst observe the
//! pre-merge cart, never a partial one.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartsync_core::{Cart, OwnerKey, ValidityReport};

use crate::error::StoreError;
use crate::store::CartStore;
use crate::validate::{InventoryLookup, ValidationPolicy, validate};

/// Everything the checkout page needs, gathered in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPreview {
    pub cart: Cart,
    pub report: ValidityReport,
}

impl CheckoutPreview {
    /// Whether checkout may proceed without further confirmation.
    #[must_use]
    pub const fn ready(&self) -> bool {
        self.report.valid
    }
}

/// Eagerly fetch and validate the cart for an owner.
///
/// An absent cart is treated as empty and trivially valid.
///
/// # Errors
///
/// Returns [`StoreError`] when the cart cannot be read; inventory lookup
/// failures are absorbed into the report as unknown items.
#[instrument(skip(store, lookup, policy), fields(owner = %owner))]
pub async fn preload_checkout<S, L>(
    owner: &OwnerKey,
    store: &S,
    lookup: &L,
    policy: &ValidationPolicy,
) -> Result<CheckoutPreview, StoreError>
where
    S: CartStore + ?Sized,
    L: InventoryLookup + ?Sized,
{
    let cart = store
        .get(owner)
        .await?
        .unwrap_or_else(|| Cart::empty(owner.clone()));

    let report = if cart.is_empty() {
        ValidityReport::all_clear()
    } else {
        validate(&cart, lookup, policy).await
    };

    Ok(CheckoutPreview { cart, report })
}
