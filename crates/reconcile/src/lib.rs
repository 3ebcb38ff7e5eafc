//! Cartsync Reconcile - cart reconciliation at login and before checkout.
//!
//! When an anonymous shopper signs in, their guest cart has to be folded
//! into the user's persistent cart exactly once, even when the login hook
//! fires repeatedly or races the checkout preloader. This crate owns that
//! process end to end:
//!
//! - [`store`] - keyed cart store with compare-and-set writes (in-memory
//!   and, behind the `postgres` feature, `PostgreSQL` via `sqlx`)
//! - [`merge`] - pure guest-into-user cart merge
//! - [`validate`] - pre-checkout validation against live inventory
//! - [`trigger`] - per-login-event state machine invoking the merge at
//!   most once and retrying conflicting writes
//! - [`preload`] - read-side warmer for the checkout page
//!
//! Session issuance, routing, payment and the inventory backend itself stay
//! outside; they are reached through the [`identity::IdentityProvider`],
//! [`validate::InventoryLookup`] and [`store::CartStore`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use cartsync_reconcile::{MergeTrigger, ReconcileConfig, MemoryCartStore};
//!
//! let config = ReconcileConfig::load()?;
//! let store = Arc::new(MemoryCartStore::new());
//! let trigger = MergeTrigger::new(store, identity, config.merge_retries);
//!
//! // From the login hook:
//! let outcome = trigger.on_login(&event).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod identity;
pub mod merge;
pub mod preload;
pub mod store;
pub mod trigger;
pub mod validate;

pub use config::{ConfigError, ReconcileConfig};
pub use error::{InventoryError, StoreError, TriggerError};
pub use identity::{IdentityProvider, LoginEvent};
pub use merge::merge;
pub use preload::{CheckoutPreview, preload_checkout};
pub use store::{CartStore, MemoryCartStore};
#[cfg(feature = "postgres")]
pub use store::{PgCartStore, create_pool};
pub use trigger::{MergeOutcome, MergePhase, MergeTrigger};
pub use validate::{
    CachedInventoryLookup, InventoryLevel, InventoryLookup, ValidationPolicy, apply_report,
    validate,
};
