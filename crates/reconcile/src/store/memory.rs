//! In-memory cart store.
//!
//! A `tokio::sync::Mutex` around a `HashMap` linearizes compare-and-set
//! writes per process. Used by tests and as the reference implementation of
//! the store contract; production deployments use the `postgres` backend.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use cartsync_core::{Cart, OwnerKey};

use super::{CartStore, check_write};
use crate::error::StoreError;

/// In-process cart store with compare-and-set semantics.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<String, Cart>>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CartStore for MemoryCartStore {
    async fn get(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError> {
        let carts = self.carts.lock().await;
        match carts.get(&owner.storage_key()) {
            Some(cart) => {
                cart.check_invariants()
                    .map_err(|violation| StoreError::Corruption(violation.to_string()))?;
                Ok(Some(cart.clone()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, cart), fields(owner = %owner, base = cart.version))]
    async fn put(&self, owner: &OwnerKey, cart: Cart) -> Result<Cart, StoreError> {
        check_write(owner, &cart)?;

        let key = owner.storage_key();
        let mut carts = self.carts.lock().await;
        let found = carts.get(&key).map_or(0, |stored| stored.version);
        if cart.version != found {
            return Err(StoreError::Conflict {
                owner: key,
                base: cart.version,
                found,
            });
        }

        let committed = Cart {
            version: found + 1,
            updated_at: Utc::now(),
            ..cart
        };
        debug!(version = committed.version, "cart write committed");
        carts.insert(key, committed.clone());
        Ok(committed)
    }

    async fn delete(&self, owner: &OwnerKey) -> Result<(), StoreError> {
        let mut carts = self.carts.lock().await;
        carts.remove(&owner.storage_key());
        Ok(())
    }
}
