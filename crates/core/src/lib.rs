//! Cartsync Core - Shared domain types.
//!
//! This crate provides the cart domain model used across all Cartsync
//! components:
//! - `reconcile` - Cart reconciliation library (merge, validation, trigger)
//! - `integration-tests` - Cross-component scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, carts, line items, and the read models
//!   produced by merging and validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
