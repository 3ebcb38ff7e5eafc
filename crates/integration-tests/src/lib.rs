//! Integration test harness for Cartsync.
//!
//! Scenario tests exercise the reconciliation flow end to end against the
//! in-memory store: login merges racing each other, compare-and-set
//! contention across tasks, and checkout preloads overlapping in-flight
//! merges. The `postgres` store backend shares the same `CartStore`
//! contract and is covered by the reconcile crate's unit tests; running it
//! here would require a live database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use cartsync_core::{
    CurrencyCode, ItemKey, LineItem, Price, ProductId, SessionId, UserId, VariantId,
};
use cartsync_reconcile::{IdentityProvider, InventoryError, InventoryLevel, InventoryLookup};

/// Initialize tracing output for tests once per process.
///
/// Controlled via `RUST_LOG`; silent by default.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A USD price from cents.
#[must_use]
pub fn usd(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
}

/// A line item added now, priced in USD.
#[must_use]
pub fn line_item(product: &str, quantity: u32, cents: i64) -> LineItem {
    LineItem {
        product_id: ProductId::new(product),
        variant_id: None,
        quantity,
        unit_price: usd(cents),
        added_at: Utc::now(),
    }
}

/// Identity provider whose current user can be switched mid-test.
#[derive(Debug, Default)]
pub struct SwitchableIdentity {
    user: Mutex<Option<UserId>>,
}

impl SwitchableIdentity {
    #[must_use]
    pub fn logged_in(user: &str) -> Self {
        Self {
            user: Mutex::new(Some(UserId::new(user))),
        }
    }

    pub fn switch(&self, user: Option<UserId>) {
        *self.user.lock().unwrap() = user;
    }
}

impl IdentityProvider for SwitchableIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.lock().unwrap().clone()
    }
}

/// Table-driven inventory; products missing from the table are unavailable.
#[derive(Debug, Default)]
pub struct StaticInventory {
    levels: HashMap<ItemKey, InventoryLevel>,
}

impl StaticInventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product with the given stock and price.
    #[must_use]
    pub fn with(mut self, product: &str, stock: u32, cents: i64) -> Self {
        self.levels.insert(
            ItemKey::new(product, None),
            InventoryLevel {
                stock,
                price: usd(cents),
                delisted: false,
            },
        );
        self
    }
}

#[async_trait]
impl InventoryLookup for StaticInventory {
    async fn lookup(
        &self,
        product: &ProductId,
        variant: Option<&VariantId>,
    ) -> Result<InventoryLevel, InventoryError> {
        let key = ItemKey {
            product: product.clone(),
            variant: variant.cloned(),
        };
        self.levels
            .get(&key)
            .copied()
            .ok_or_else(|| InventoryError::Unavailable(format!("no data for {key}")))
    }
}

/// A fresh guest session ID for a test.
#[must_use]
pub fn guest_session() -> SessionId {
    SessionId::generate()
}
