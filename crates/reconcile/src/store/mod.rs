//! Cart store: durable keyed cart state with compare-and-set writes.
//!
//! The store is the only mutable shared resource in the system. Carts are
//! never mutated in place - every write replaces the whole cart value under
//! optimistic concurrency control, which keeps the "no duplicate identity
//! keys" invariant enforceable by construction.
//!
//! # Backends
//!
//! - [`MemoryCartStore`] - in-process map, used by tests and as the
//!   reference implementation of the CAS semantics
//! - `PgCartStore` - `PostgreSQL` via `sqlx` (feature `postgres`)

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryCartStore;
#[cfg(feature = "postgres")]
pub use postgres::{PgCartStore, create_pool};

use async_trait::async_trait;

use cartsync_core::{Cart, OwnerKey};

use crate::error::StoreError;

/// Durable keyed store for carts.
///
/// `put` is a compare-and-set against the cart's `version` field: the write
/// succeeds only if the stored version still equals the caller's base
/// version (`cart.version`), otherwise it fails with
/// [`StoreError::Conflict`]. Two concurrent writes to the same owner key
/// never both succeed against the same base version.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Read the cart for an owner. Absent means "empty cart", not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corruption`] if the stored cart violates the
    /// cart invariants; backend failures as their respective variants.
    async fn get(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError>;

    /// Commit a whole-cart write under `owner`, using `cart.version` as the
    /// compare-and-set base. Returns the committed cart with the version
    /// incremented and `updated_at` refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the base version is stale, and
    /// [`StoreError::Corruption`] when the submitted cart violates the cart
    /// invariants or is keyed under a different owner.
    async fn put(&self, owner: &OwnerKey, cart: Cart) -> Result<Cart, StoreError>;

    /// Remove the cart for an owner. Deleting an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns backend failures as their respective variants.
    async fn delete(&self, owner: &OwnerKey) -> Result<(), StoreError>;
}

/// Reject writes that are malformed before they reach any backend.
fn check_write(owner: &OwnerKey, cart: &Cart) -> Result<(), StoreError> {
    if cart.owner != *owner {
        return Err(StoreError::Corruption(format!(
            "cart owned by {} submitted under key {}",
            cart.owner, owner
        )));
    }
    cart.check_invariants()
        .map_err(|violation| StoreError::Corruption(violation.to_string()))
}
