//! Cart validator: check a cart against live inventory before checkout.
//!
//! Validation is read-only. It produces an itemized [`ValidityReport`];
//! callers decide whether to apply caps and removals as a follow-up store
//! write. Inventory is consulted through the [`InventoryLookup`] trait so
//! the core stays agnostic to the upstream commerce platform.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use cartsync_core::{
    CappedItem, Cart, ItemKey, Price, PriceChange, ProductId, RemovalReason, RemovedItem,
    ValidityReport, VariantId,
};

use crate::error::InventoryError;

/// Authoritative stock and pricing for one product variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryLevel {
    /// Units currently available.
    pub stock: u32,
    /// Current listed price.
    pub price: Price,
    /// Whether the product has been removed from sale.
    pub delisted: bool,
}

/// External product/inventory lookup collaborator.
#[async_trait]
pub trait InventoryLookup: Send + Sync {
    /// Fetch current stock and price for a product variant.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Unavailable`] when the collaborator cannot
    /// answer; the validator marks the item unknown rather than guessing.
    async fn lookup(
        &self,
        product: &ProductId,
        variant: Option<&VariantId>,
    ) -> Result<InventoryLevel, InventoryError>;
}

/// Tunable validation thresholds.
#[derive(Debug, Clone, Default)]
pub struct ValidationPolicy {
    /// Absolute price delta (in currency units) treated as informational.
    /// A move beyond this removes the item and requires re-confirmation.
    pub price_tolerance: Decimal,
}

/// Validate a cart's line items against live inventory.
///
/// Policy, per item:
/// - delisted product: removed (`delisted`)
/// - zero stock: removed (`out_of_stock`)
/// - price moved beyond tolerance (or switched currency): removed
///   (`price_changed`)
/// - stock below requested quantity: capped to available stock
/// - price moved within tolerance: recorded, not blocking
/// - lookup failure: marked unknown; `valid` is forced false
///
/// `valid` is true only when nothing was removed, capped, or unknown.
#[instrument(skip_all, fields(owner = %cart.owner, items = cart.items.len()))]
pub async fn validate<L>(cart: &Cart, lookup: &L, policy: &ValidationPolicy) -> ValidityReport
where
    L: InventoryLookup + ?Sized,
{
    let mut report = ValidityReport::all_clear();

    for item in &cart.items {
        let key = item.key();
        let level = match lookup.lookup(&item.product_id, item.variant_id.as_ref()).await {
            Ok(level) => level,
            Err(err) => {
                warn!(item = %key, error = %err, "inventory lookup failed, item unknown");
                report.unknown_items.push(key);
                continue;
            }
        };

        if level.delisted {
            report.removed_items.push(RemovedItem {
                key,
                reason: RemovalReason::Delisted,
            });
            continue;
        }

        if level.stock == 0 {
            report.removed_items.push(RemovedItem {
                key,
                reason: RemovalReason::OutOfStock,
            });
            continue;
        }

        match item.unit_price.abs_delta(&level.price) {
            Some(delta) if delta > policy.price_tolerance => {
                report.removed_items.push(RemovedItem {
                    key,
                    reason: RemovalReason::PriceChanged,
                });
                continue;
            }
            Some(delta) if delta > Decimal::ZERO => {
                report.price_changes.push(PriceChange {
                    key: key.clone(),
                    old: item.unit_price,
                    new: level.price,
                });
            }
            // A currency switch is never a numeric delta within tolerance.
            None => {
                report.removed_items.push(RemovedItem {
                    key,
                    reason: RemovalReason::PriceChanged,
                });
                continue;
            }
            _ => {}
        }

        if level.stock < item.quantity {
            report.capped_items.push(CappedItem {
                key,
                requested: item.quantity,
                allowed: level.stock,
            });
        }
    }

    report.valid = report.removed_items.is_empty()
        && report.capped_items.is_empty()
        && report.unknown_items.is_empty();
    debug!(valid = report.valid, "validation complete");
    report
}

/// Apply a validity report to a cart, producing the follow-up write value.
///
/// Removed items are dropped, capped items take their allowed quantity, and
/// unknown items are retained untouched. The result keeps the input cart's
/// version so it can be written back with compare-and-set.
#[must_use]
pub fn apply_report(cart: &Cart, report: &ValidityReport) -> Cart {
    let removed: Vec<&ItemKey> = report.removed_items.iter().map(|r| &r.key).collect();
    let items = cart
        .items
        .iter()
        .filter(|item| !removed.contains(&&item.key()))
        .map(|item| {
            let mut item = item.clone();
            if let Some(cap) = report.capped_items.iter().find(|c| c.key == item.key()) {
                item.quantity = cap.allowed;
            }
            item
        })
        .collect();
    Cart {
        owner: cart.owner.clone(),
        items,
        updated_at: cart.updated_at,
        version: cart.version,
    }
}

/// Caching wrapper around an [`InventoryLookup`].
///
/// Levels are cached per item key with a bounded TTL; failures are never
/// cached, so a recovering collaborator is retried on the next lookup.
pub struct CachedInventoryLookup<L> {
    inner: L,
    cache: moka::future::Cache<ItemKey, InventoryLevel>,
}

impl<L> CachedInventoryLookup<L> {
    /// Wrap a lookup with a cache of `capacity` entries living for `ttl`.
    #[must_use]
    pub fn new(inner: L, ttl: std::time::Duration, capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }
}

#[async_trait]
impl<L: InventoryLookup> InventoryLookup for CachedInventoryLookup<L> {
    async fn lookup(
        &self,
        product: &ProductId,
        variant: Option<&VariantId>,
    ) -> Result<InventoryLevel, InventoryError> {
        let key = ItemKey {
            product: product.clone(),
            variant: variant.cloned(),
        };
        self.cache
            .try_get_with(key, self.inner.lookup(product, variant))
            .await
            .map_err(|err| (*err).clone())
    }
}
